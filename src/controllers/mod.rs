pub mod home_controller;
pub mod movie_controller;
pub mod review_controller;
pub mod user_controller;
pub mod watchlist_controller;
