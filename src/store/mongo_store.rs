use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, from_document, oid::ObjectId, Bson, DateTime, Document},
    error::{ErrorKind, WriteFailure},
    options::{ClientOptions, FindOneAndUpdateOptions, IndexOptions, ReturnDocument},
    Client, Collection, Database, IndexModel,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info};

use super::{CatalogStore, MovieQuery, ReviewScope, StoreError, StoreResult};
use crate::models::{
    movie_model::{Movie, MovieMetadata, MovieUpdate, ReviewStats},
    review_model::{Review, ReviewAuthor, ReviewEntry, ReviewSubmission, ReviewUpdate},
    user_model::{NewUser, ProfileUpdate, User},
    watchlist_model::{WatchStatus, WatchlistAdd, WatchlistEntry, WatchlistItem, WatchlistUpdate},
    Page, PageRequest,
};

const MOVIES: &str = "movies";
const REVIEWS: &str = "reviews";
const WATCHLIST: &str = "watchlist";
const USERS: &str = "users";

#[derive(Debug, Serialize, Deserialize, Clone)]
struct MovieDocument {
    #[serde(rename = "_id")]
    external_id: String,
    title: String,
    year: Option<i32>,
    genre: Option<String>,
    director: Option<String>,
    cast: Option<String>,
    plot: Option<String>,
    runtime: Option<String>,
    rating: Option<f64>,
    poster: Option<String>,
    average_rating: f64,
    total_reviews: i64,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<&Movie> for MovieDocument {
    fn from(movie: &Movie) -> Self {
        MovieDocument {
            external_id: movie.external_id.clone(),
            title: movie.title.clone(),
            year: movie.year,
            genre: movie.genre.clone(),
            director: movie.director.clone(),
            cast: movie.cast.clone(),
            plot: movie.plot.clone(),
            runtime: movie.runtime.clone(),
            rating: movie.rating,
            poster: movie.poster.clone(),
            average_rating: movie.average_rating,
            total_reviews: movie.total_reviews as i64,
            created_at: DateTime::from_chrono(movie.created_at),
            updated_at: DateTime::from_chrono(movie.updated_at),
        }
    }
}

impl From<MovieDocument> for Movie {
    fn from(doc: MovieDocument) -> Self {
        Movie {
            external_id: doc.external_id,
            title: doc.title,
            year: doc.year,
            genre: doc.genre,
            director: doc.director,
            cast: doc.cast,
            plot: doc.plot,
            runtime: doc.runtime,
            rating: doc.rating,
            poster: doc.poster,
            average_rating: doc.average_rating,
            total_reviews: doc.total_reviews.max(0) as u64,
            created_at: doc.created_at.to_chrono(),
            updated_at: doc.updated_at.to_chrono(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct ReviewDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    user_id: ObjectId,
    movie_id: String,
    rating: i32,
    review_text: Option<String>,
    is_spoiler: bool,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<ReviewDocument> for Review {
    fn from(doc: ReviewDocument) -> Self {
        Review {
            id: doc.id.map(|id| id.to_hex()).unwrap_or_default(),
            user_id: doc.user_id.to_hex(),
            movie_id: doc.movie_id,
            rating: u8::try_from(doc.rating).unwrap_or_default(),
            review_text: doc.review_text,
            is_spoiler: doc.is_spoiler,
            created_at: doc.created_at.to_chrono(),
            updated_at: doc.updated_at.to_chrono(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct WatchlistDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    user_id: ObjectId,
    movie_id: String,
    status: WatchStatus,
    notes: Option<String>,
    priority: i32,
    watched_at: Option<DateTime>,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<WatchlistDocument> for WatchlistItem {
    fn from(doc: WatchlistDocument) -> Self {
        WatchlistItem {
            id: doc.id.map(|id| id.to_hex()).unwrap_or_default(),
            user_id: doc.user_id.to_hex(),
            movie_id: doc.movie_id,
            status: doc.status,
            notes: doc.notes,
            priority: u8::try_from(doc.priority).unwrap_or_default(),
            watched_at: doc.watched_at.map(|d| d.to_chrono()),
            created_at: doc.created_at.to_chrono(),
            updated_at: doc.updated_at.to_chrono(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct UserDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    username: String,
    email: String,
    display_name: Option<String>,
    bio: Option<String>,
    avatar_url: Option<String>,
    is_admin: bool,
    token_hash: String,
    created_at: DateTime,
}

impl From<UserDocument> for User {
    fn from(doc: UserDocument) -> Self {
        User {
            id: doc.id.map(|id| id.to_hex()).unwrap_or_default(),
            username: doc.username,
            email: doc.email,
            display_name: doc.display_name,
            bio: doc.bio,
            avatar_url: doc.avatar_url,
            is_admin: doc.is_admin,
            created_at: doc.created_at.to_chrono(),
        }
    }
}

impl From<UserDocument> for ReviewAuthor {
    fn from(doc: UserDocument) -> Self {
        ReviewAuthor {
            id: doc.id.map(|id| id.to_hex()).unwrap_or_default(),
            username: doc.username,
            display_name: doc.display_name,
        }
    }
}

/// MongoDB-backed store. Movies are keyed by their external id in `_id`.
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> StoreResult<Self> {
        let options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(options)?;
        let db = client.database(database);
        db.run_command(doc! {"ping": 1}, None).await?;
        info!(database, "connected to MongoDB");

        let store = MongoStore { db };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> StoreResult<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.watchlist()
            .create_indexes(
                vec![
                    IndexModel::builder()
                        .keys(doc! {"user_id": 1, "movie_id": 1})
                        .options(unique())
                        .build(),
                    IndexModel::builder()
                        .keys(doc! {"user_id": 1, "status": 1, "created_at": -1})
                        .build(),
                ],
                None,
            )
            .await?;
        self.reviews()
            .create_indexes(
                vec![
                    IndexModel::builder()
                        .keys(doc! {"user_id": 1, "movie_id": 1})
                        .options(unique())
                        .build(),
                    IndexModel::builder()
                        .keys(doc! {"movie_id": 1, "created_at": -1})
                        .build(),
                ],
                None,
            )
            .await?;
        self.users()
            .create_indexes(
                vec![
                    IndexModel::builder()
                        .keys(doc! {"token_hash": 1})
                        .options(unique())
                        .build(),
                    IndexModel::builder()
                        .keys(doc! {"username": 1})
                        .options(unique())
                        .build(),
                ],
                None,
            )
            .await?;
        self.movies()
            .create_index(IndexModel::builder().keys(doc! {"created_at": -1}).build(), None)
            .await?;
        debug!("indexes ensured");
        Ok(())
    }

    fn movies(&self) -> Collection<MovieDocument> {
        self.db.collection(MOVIES)
    }

    fn reviews(&self) -> Collection<ReviewDocument> {
        self.db.collection(REVIEWS)
    }

    fn watchlist(&self) -> Collection<WatchlistDocument> {
        self.db.collection(WATCHLIST)
    }

    fn users(&self) -> Collection<UserDocument> {
        self.db.collection(USERS)
    }

    async fn collect<T, C>(&self, collection: &Collection<C>, pipeline: Vec<Document>) -> StoreResult<Vec<T>>
    where
        T: TryFrom<Document, Error = StoreError> + Send,
        C: Send + Sync,
    {
        let mut cursor = collection.aggregate(pipeline, None).await?;
        let mut result = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            result.push(T::try_from(doc)?);
        }
        Ok(result)
    }

    async fn paged<T, C>(
        &self,
        collection: &Collection<C>,
        filter: Document,
        joins: Vec<Document>,
        page: PageRequest,
    ) -> StoreResult<Page<T>>
    where
        T: TryFrom<Document, Error = StoreError> + Send,
        C: Send + Sync,
    {
        let total = collection.count_documents(filter.clone(), None).await?;
        let skip = i64::try_from(page.offset()).unwrap_or(i64::MAX);
        let limit = page.limit as i64;
        let mut pipeline = vec![
            doc! { "$match": filter },
            doc! { "$sort": { "created_at": -1, "_id": -1 } },
            doc! { "$skip": skip },
            doc! { "$limit": limit },
        ];
        pipeline.extend(joins);
        let items = self.collect(collection, pipeline).await?;
        Ok(Page::new(items, page, total))
    }

    async fn load_movie(&self, external_id: &str) -> StoreResult<Option<Movie>> {
        Ok(self
            .movies()
            .find_one(doc! {"_id": external_id}, None)
            .await?
            .map(Movie::from))
    }
}

fn parse_id(id: &str) -> Option<ObjectId> {
    ObjectId::parse_str(id).ok()
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == 11000,
        ErrorKind::Command(e) => e.code == 11000,
        _ => false,
    }
}

fn escape_regex(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if !c.is_alphanumeric() && !c.is_whitespace() {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn movie_join(local_field: &str) -> Vec<Document> {
    vec![
        doc! {
            "$lookup": {
                "from": MOVIES,
                "localField": local_field,
                "foreignField": "_id",
                "as": "movie"
            }
        },
        doc! {
            "$unwind": {
                "path": "$movie",
                "preserveNullAndEmptyArrays": true
            }
        },
    ]
}

fn author_join() -> Vec<Document> {
    vec![
        doc! {
            "$lookup": {
                "from": USERS,
                "localField": "user_id",
                "foreignField": "_id",
                "as": "author"
            }
        },
        doc! {
            "$unwind": {
                "path": "$author",
                "preserveNullAndEmptyArrays": true
            }
        },
    ]
}

/// Detaches a `$lookup` result so the base document decodes on its own.
fn take_joined<T: DeserializeOwned>(doc: &mut Document, key: &str) -> StoreResult<Option<T>> {
    match doc.remove(key) {
        Some(Bson::Document(joined)) => Ok(Some(from_document(joined)?)),
        _ => Ok(None),
    }
}

impl TryFrom<Document> for Movie {
    type Error = StoreError;

    fn try_from(doc: Document) -> Result<Self, Self::Error> {
        Ok(from_document::<MovieDocument>(doc)?.into())
    }
}

impl TryFrom<Document> for WatchlistEntry {
    type Error = StoreError;

    fn try_from(mut doc: Document) -> Result<Self, Self::Error> {
        let movie = take_joined::<MovieDocument>(&mut doc, "movie")?;
        Ok(WatchlistEntry {
            item: from_document::<WatchlistDocument>(doc)?.into(),
            movie: movie.map(Movie::from),
        })
    }
}

impl TryFrom<Document> for ReviewEntry {
    type Error = StoreError;

    fn try_from(mut doc: Document) -> Result<Self, Self::Error> {
        let movie = take_joined::<MovieDocument>(&mut doc, "movie")?;
        let author = take_joined::<UserDocument>(&mut doc, "author")?;
        Ok(ReviewEntry {
            review: from_document::<ReviewDocument>(doc)?.into(),
            author: author.map(ReviewAuthor::from),
            movie: movie.map(Movie::from),
        })
    }
}

fn bson_number(value: Option<&Bson>) -> f64 {
    match value {
        Some(Bson::Double(v)) => *v,
        Some(Bson::Int32(v)) => *v as f64,
        Some(Bson::Int64(v)) => *v as f64,
        _ => 0.0,
    }
}

#[async_trait]
impl CatalogStore for MongoStore {
    async fn get_or_create_movie(&self, external_id: &str) -> StoreResult<(Movie, bool)> {
        let placeholder = Movie::placeholder(external_id, Utc::now());
        let mut on_insert = bson::to_document(&MovieDocument::from(&placeholder))?;
        on_insert.remove("_id");

        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::Before)
            .build();
        let result = self
            .movies()
            .find_one_and_update(
                doc! {"_id": external_id},
                doc! {"$setOnInsert": on_insert},
                options,
            )
            .await;

        match result {
            Ok(Some(existing)) => Ok((existing.into(), false)),
            Ok(None) => {
                debug!(external_id, "created placeholder movie");
                Ok((placeholder, true))
            }
            // Lost an upsert race, the other writer created it.
            Err(e) if is_duplicate_key(&e) => self
                .load_movie(external_id)
                .await?
                .map(|m| (m, false))
                .ok_or(StoreError::NotFound("movie")),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_movie(&self, external_id: &str) -> StoreResult<Option<Movie>> {
        self.load_movie(external_id).await
    }

    async fn insert_movie(&self, movie: Movie) -> StoreResult<Movie> {
        match self.movies().insert_one(MovieDocument::from(&movie), None).await {
            Ok(_) => Ok(movie),
            Err(e) if is_duplicate_key(&e) => Err(StoreError::Conflict(format!(
                "movie {} already exists",
                movie.external_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn enrich_movie(&self, external_id: &str, metadata: &MovieMetadata) -> StoreResult<Movie> {
        // None fields are skipped by serde, so only supplied fields land in $set.
        let mut set = bson::to_document(metadata)?;
        set.insert("updated_at", DateTime::from_chrono(Utc::now()));

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.movies()
            .find_one_and_update(doc! {"_id": external_id}, doc! {"$set": set}, options)
            .await?
            .map(Movie::from)
            .ok_or(StoreError::NotFound("movie"))
    }

    async fn update_movie(&self, external_id: &str, update: &MovieUpdate) -> StoreResult<Movie> {
        // Null patches serialize as null, which clears the stored field.
        let mut set = bson::to_document(update)?;
        set.insert("updated_at", DateTime::from_chrono(Utc::now()));

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.movies()
            .find_one_and_update(doc! {"_id": external_id}, doc! {"$set": set}, options)
            .await?
            .map(Movie::from)
            .ok_or(StoreError::NotFound("movie"))
    }

    async fn list_movies(&self, query: &MovieQuery, page: PageRequest) -> StoreResult<Page<Movie>> {
        let filter = match &query.search {
            Some(search) => doc! {"title": {"$regex": escape_regex(search), "$options": "i"}},
            None => doc! {},
        };
        self.paged(&self.movies(), filter, Vec::new(), page).await
    }

    async fn refresh_movie_stats(&self, external_id: &str) -> StoreResult<ReviewStats> {
        let pipeline = vec![
            doc! { "$match": { "movie_id": external_id } },
            doc! {
                "$group": {
                    "_id": Bson::Null,
                    "average": { "$avg": "$rating" },
                    "count": { "$sum": 1 }
                }
            },
        ];
        let mut cursor = self.reviews().aggregate(pipeline, None).await?;
        let stats = match cursor.try_next().await? {
            Some(group) => ReviewStats::from_mean(
                bson_number(group.get("average")),
                bson_number(group.get("count")) as u64,
            ),
            None => ReviewStats::default(),
        };

        let total_reviews = stats.total_reviews as i64;
        let result = self
            .movies()
            .update_one(
                doc! {"_id": external_id},
                doc! {"$set": {
                    "average_rating": stats.average_rating,
                    "total_reviews": total_reviews,
                }},
                None,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(StoreError::NotFound("movie"));
        }
        Ok(stats)
    }

    async fn find_review(&self, id: &str) -> StoreResult<Option<Review>> {
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };
        Ok(self
            .reviews()
            .find_one(doc! {"_id": oid}, None)
            .await?
            .map(Review::from))
    }

    async fn find_user_review(&self, user_id: &str, movie_id: &str) -> StoreResult<Option<Review>> {
        let Some(user_oid) = parse_id(user_id) else {
            return Ok(None);
        };
        Ok(self
            .reviews()
            .find_one(doc! {"user_id": user_oid, "movie_id": movie_id}, None)
            .await?
            .map(Review::from))
    }

    async fn insert_review(&self, user_id: &str, submission: &ReviewSubmission) -> StoreResult<Review> {
        let user_oid = parse_id(user_id).ok_or_else(|| StoreError::InvalidId(user_id.to_string()))?;
        let now = DateTime::from_chrono(Utc::now());
        let mut document = ReviewDocument {
            id: None,
            user_id: user_oid,
            movie_id: submission.movie_id.clone(),
            rating: submission.rating as i32,
            review_text: submission.review_text.clone(),
            is_spoiler: submission.is_spoiler,
            created_at: now,
            updated_at: now,
        };
        match self.reviews().insert_one(&document, None).await {
            Ok(inserted) => {
                document.id = inserted.inserted_id.as_object_id();
                Ok(document.into())
            }
            Err(e) if is_duplicate_key(&e) => Err(StoreError::Conflict(
                "you have already reviewed this movie".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_review(&self, id: &str, update: &ReviewUpdate) -> StoreResult<Review> {
        let mut review = self
            .find_review(id)
            .await?
            .ok_or(StoreError::NotFound("review"))?;
        review.apply_update(update, Utc::now());

        let oid = parse_id(id).ok_or(StoreError::NotFound("review"))?;
        let rating = review.rating as i32;
        let review_text = review.review_text.clone();
        let updated_at = DateTime::from_chrono(review.updated_at);
        self.reviews()
            .update_one(
                doc! {"_id": oid},
                doc! {"$set": {
                    "rating": rating,
                    "review_text": review_text,
                    "is_spoiler": review.is_spoiler,
                    "updated_at": updated_at,
                }},
                None,
            )
            .await?;
        Ok(review)
    }

    async fn delete_review(&self, id: &str) -> StoreResult<()> {
        let oid = parse_id(id).ok_or(StoreError::NotFound("review"))?;
        let result = self.reviews().delete_one(doc! {"_id": oid}, None).await?;
        if result.deleted_count == 0 {
            return Err(StoreError::NotFound("review"));
        }
        Ok(())
    }

    async fn review_entry(&self, id: &str) -> StoreResult<Option<ReviewEntry>> {
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };
        let mut pipeline = vec![doc! { "$match": { "_id": oid } }];
        pipeline.extend(author_join());
        pipeline.extend(movie_join("movie_id"));
        let entries: Vec<ReviewEntry> = self.collect(&self.reviews(), pipeline).await?;
        Ok(entries.into_iter().next())
    }

    async fn list_reviews(&self, scope: &ReviewScope, page: PageRequest) -> StoreResult<Page<ReviewEntry>> {
        let filter = match scope {
            ReviewScope::Movie(movie_id) => doc! {"movie_id": movie_id},
            ReviewScope::User(user_id) => {
                let oid = parse_id(user_id).ok_or_else(|| StoreError::InvalidId(user_id.clone()))?;
                doc! {"user_id": oid}
            }
        };
        let mut joins = author_join();
        joins.extend(movie_join("movie_id"));
        self.paged(&self.reviews(), filter, joins, page).await
    }

    async fn find_watchlist_item(&self, id: &str) -> StoreResult<Option<WatchlistItem>> {
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };
        Ok(self
            .watchlist()
            .find_one(doc! {"_id": oid}, None)
            .await?
            .map(WatchlistItem::from))
    }

    async fn find_watchlist_entry_for_movie(
        &self,
        user_id: &str,
        movie_id: &str,
    ) -> StoreResult<Option<WatchlistItem>> {
        let Some(user_oid) = parse_id(user_id) else {
            return Ok(None);
        };
        Ok(self
            .watchlist()
            .find_one(doc! {"user_id": user_oid, "movie_id": movie_id}, None)
            .await?
            .map(WatchlistItem::from))
    }

    async fn insert_watchlist_item(&self, user_id: &str, add: &WatchlistAdd) -> StoreResult<WatchlistItem> {
        let user_oid = parse_id(user_id).ok_or_else(|| StoreError::InvalidId(user_id.to_string()))?;
        let item = WatchlistItem::new(String::new(), user_id, add, Utc::now());
        let mut document = WatchlistDocument {
            id: None,
            user_id: user_oid,
            movie_id: item.movie_id.clone(),
            status: item.status,
            notes: item.notes.clone(),
            priority: item.priority as i32,
            watched_at: item.watched_at.map(DateTime::from_chrono),
            created_at: DateTime::from_chrono(item.created_at),
            updated_at: DateTime::from_chrono(item.updated_at),
        };
        match self.watchlist().insert_one(&document, None).await {
            Ok(inserted) => {
                document.id = inserted.inserted_id.as_object_id();
                Ok(document.into())
            }
            Err(e) if is_duplicate_key(&e) => Err(StoreError::Conflict(
                "movie is already in your watchlist".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_watchlist_item(&self, id: &str, update: &WatchlistUpdate) -> StoreResult<WatchlistItem> {
        let mut item = self
            .find_watchlist_item(id)
            .await?
            .ok_or(StoreError::NotFound("watchlist item"))?;
        item.apply_update(update, Utc::now());

        let oid = parse_id(id).ok_or(StoreError::NotFound("watchlist item"))?;
        let priority = item.priority as i32;
        let notes = item.notes.clone();
        let watched_at = item.watched_at.map(DateTime::from_chrono);
        let updated_at = DateTime::from_chrono(item.updated_at);
        self.watchlist()
            .update_one(
                doc! {"_id": oid},
                doc! {"$set": {
                    "status": item.status.as_str(),
                    "notes": notes,
                    "priority": priority,
                    "watched_at": watched_at,
                    "updated_at": updated_at,
                }},
                None,
            )
            .await?;
        Ok(item)
    }

    async fn delete_watchlist_item(&self, id: &str) -> StoreResult<()> {
        let oid = parse_id(id).ok_or(StoreError::NotFound("watchlist item"))?;
        let result = self.watchlist().delete_one(doc! {"_id": oid}, None).await?;
        if result.deleted_count == 0 {
            return Err(StoreError::NotFound("watchlist item"));
        }
        Ok(())
    }

    async fn watchlist_entry(&self, id: &str) -> StoreResult<Option<WatchlistEntry>> {
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };
        let mut pipeline = vec![doc! { "$match": { "_id": oid } }];
        pipeline.extend(movie_join("movie_id"));
        let entries: Vec<WatchlistEntry> = self.collect(&self.watchlist(), pipeline).await?;
        Ok(entries.into_iter().next())
    }

    async fn list_watchlist(
        &self,
        user_id: &str,
        status: Option<WatchStatus>,
        page: PageRequest,
    ) -> StoreResult<Page<WatchlistEntry>> {
        let user_oid = parse_id(user_id).ok_or_else(|| StoreError::InvalidId(user_id.to_string()))?;
        let mut filter = doc! {"user_id": user_oid};
        if let Some(status) = status {
            filter.insert("status", status.as_str());
        }
        self.paged(&self.watchlist(), filter, movie_join("movie_id"), page)
            .await
    }

    async fn find_user_by_token_hash(&self, token_hash: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users()
            .find_one(doc! {"token_hash": token_hash}, None)
            .await?
            .map(User::from))
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut document = UserDocument {
            id: None,
            username: user.username,
            email: user.email,
            display_name: None,
            bio: None,
            avatar_url: None,
            is_admin: user.is_admin,
            token_hash: user.token_hash,
            created_at: DateTime::from_chrono(Utc::now()),
        };
        match self.users().insert_one(&document, None).await {
            Ok(inserted) => {
                document.id = inserted.inserted_id.as_object_id();
                Ok(document.into())
            }
            Err(e) if is_duplicate_key(&e) => Err(StoreError::Conflict(format!(
                "username {} is taken",
                document.username
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> StoreResult<User> {
        let oid = parse_id(user_id).ok_or(StoreError::NotFound("user"))?;
        let mut user: User = self
            .users()
            .find_one(doc! {"_id": oid}, None)
            .await?
            .map(User::from)
            .ok_or(StoreError::NotFound("user"))?;
        user.apply_profile(update);

        let display_name = user.display_name.clone();
        let bio = user.bio.clone();
        let avatar_url = user.avatar_url.clone();
        self.users()
            .update_one(
                doc! {"_id": oid},
                doc! {"$set": {
                    "display_name": display_name,
                    "bio": bio,
                    "avatar_url": avatar_url,
                }},
                None,
            )
            .await?;
        Ok(user)
    }
}
