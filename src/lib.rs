#[macro_use]
extern crate rocket;

pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod request_logger;
pub mod routes;
pub mod search;
pub mod store;
pub mod threading;

use crate::config::AppConfig;
use crate::request_logger::RequestLogger;
use crate::search::HybridEngine;
use env_logger::Env;
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedOrigins, CorsOptions};
use sqlx::SqlitePool;
use std::sync::{Arc, Once};

static LOGGER: Once = Once::new();

fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

pub fn rocket(config: AppConfig) -> Rocket<Build> {
    init_logger();

    // Configure CORS
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![Method::Get]
                .into_iter()
                .map(From::from)
                .collect(),
        )
        .allow_credentials(true)
        .to_cors()
        .expect("Error creating CORS");

    rocket::build()
        .attach(RequestLogger)
        .attach(cors)
        .manage(config.clone())
        // Open the store, running the full ingestion pipeline when absent
        .attach(AdHoc::try_on_ignite("Bootstrap Store", |rocket| async move {
            let config = rocket
                .state::<AppConfig>()
                .cloned()
                .unwrap_or_default();
            match ingest::bootstrap_if_absent(&config).await {
                Ok(pool) => {
                    log::info!("store ready at {}", config.db_path.display());
                    Ok(rocket.manage(pool))
                }
                Err(e) => {
                    log::error!("store bootstrap failed: {}", e);
                    Err(rocket)
                }
            }
        }))
        // Build both search indices over the committed corpus
        .attach(AdHoc::try_on_ignite(
            "Build Search Indexes",
            |rocket| async move {
                let engine = Arc::new(HybridEngine::new());
                match rocket.state::<SqlitePool>() {
                    Some(pool) => match store::load_corpus(pool).await {
                        Ok(corpus) => {
                            let (lexical, semantic) = search::build_indexes(&corpus);
                            engine.install(lexical, semantic);
                            Ok(rocket.manage(engine))
                        }
                        Err(e) => {
                            log::error!("failed to load corpus for indexing: {}", e);
                            Err(rocket)
                        }
                    },
                    None => {
                        log::error!("database pool not available for indexing");
                        Err(rocket)
                    }
                }
            },
        ))
        .mount("/api", routes::api_routes())
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use crate::config::AppConfig;
    use crate::search::HybridEngine;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route};
    use sqlx::SqlitePool;
    use std::sync::Arc;

    /// Builder for constructing Rocket instances tailored for integration tests.
    #[derive(Default)]
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
        pool: Option<SqlitePool>,
        engine: Option<Arc<HybridEngine>>,
        config: Option<AppConfig>,
    }

    impl TestRocketBuilder {
        /// Start a builder with sensible defaults: random port, logging disabled.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", "off"))
                .merge(("cli_colors", false));

            Self {
                figment,
                mounts: Vec::new(),
                pool: None,
                engine: None,
                config: None,
            }
        }

        /// Mount routes under `/api`.
        pub fn mount_api_routes(mut self, routes: Vec<Route>) -> Self {
            self.mounts.push(("/api".to_string(), routes));
            self
        }

        pub fn manage_pool(mut self, pool: SqlitePool) -> Self {
            self.pool = Some(pool);
            self
        }

        pub fn manage_engine(mut self, engine: Arc<HybridEngine>) -> Self {
            self.engine = Some(engine);
            self
        }

        pub fn manage_config(mut self, config: AppConfig) -> Self {
            self.config = Some(config);
            self
        }

        /// Finish building the Rocket instance.
        pub fn build(self) -> Rocket<Build> {
            let mut rocket = rocket::custom(self.figment);

            for (base, routes) in self.mounts {
                rocket = rocket.mount(base, routes);
            }

            if let Some(pool) = self.pool {
                rocket = rocket.manage(pool);
            }
            if let Some(engine) = self.engine {
                rocket = rocket.manage(engine);
            }
            if let Some(config) = self.config {
                rocket = rocket.manage(config);
            }

            rocket
        }

        /// Convenience helper to produce a blocking local client.
        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        /// Convenience helper to produce an asynchronous local client.
        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }
}
