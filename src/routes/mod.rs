pub mod health;
pub mod search;
pub mod stats;
pub mod threads;

use rocket::Route;

pub fn api_routes() -> Vec<Route> {
    routes![
        health::health_check,
        search::search,
        stats::get_stats,
        threads::list_threads,
        threads::get_thread,
    ]
}
