//! HTTP and WebSocket listener
//!
//! Owns the shared state, spawns the broadcast router and serves the axum
//! application until shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};

use super::handlers::{call, display, settings};
use super::state::AppState;
use super::ws;
use crate::calendar::BusinessDay;
use crate::error::Result;
use crate::registry::ConnectionRegistry;
use crate::router::BroadcastRouter;
use crate::server::config::ServerConfig;
use crate::status::CallStatusMachine;
use crate::store::QueueStore;
use crate::tts::{AudioGenerator, SpeechSynthesizer};

/// Mount point for audio kept outside the assets directory
const AUDIO_ROUTE: &str = "/audio";

/// Queue display server
pub struct QueueServer<S, V> {
    config: ServerConfig,
    state: AppState<S, V>,
    router_task: JoinHandle<()>,
}

impl<S: QueueStore, V: SpeechSynthesizer> QueueServer<S, V> {
    /// Create a server over `store`, announcing with `synthesizer`
    ///
    /// Must be called from within a tokio runtime; the broadcast router
    /// task is spawned here.
    pub fn new(config: ServerConfig, store: S, synthesizer: V) -> Self {
        let store = Arc::new(store);
        let registry = Arc::new(ConnectionRegistry::with_config(config.registry.clone()));
        let (router, router_task) = BroadcastRouter::spawn(Arc::clone(&registry));
        let status = Arc::new(CallStatusMachine::with_delay(
            Arc::clone(&store),
            config.reversion_delay,
        ));
        let audio = Arc::new(AudioGenerator::new(
            synthesizer,
            config.audio_dir.clone(),
            audio_url_prefix(&config),
        ));

        let state = AppState::new(
            store,
            registry,
            router,
            status,
            audio,
            config.tts_timeout,
            config.max_connections,
        );

        Self {
            config,
            state,
            router_task,
        }
    }

    /// Pin every queue query to `day`
    pub fn with_business_day(mut self, day: BusinessDay) -> Self {
        self.state.set_fixed_day(day);
        self
    }

    pub fn state(&self) -> &AppState<S, V> {
        &self.state
    }

    /// Get a reference to the connection registry
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.state.registry
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// The full application: API, push sockets, assets and the SPA
    pub fn router(&self) -> Router {
        let api = Router::new()
            // push connections
            .route("/ws/{kd_display}", get(ws::display_socket::<S, V>))
            .route("/ws/antrian/{kd_ruang_poli}", get(ws::room_socket::<S, V>))
            // display board and calling screen
            .route("/api/display/poli/{kd_display}", get(display::display_listing::<S, V>))
            .route("/api/display/missed/{kd_ruang_poli}", get(display::missed_patients::<S, V>))
            .route("/api/panggil/{kd_ruang_poli}", get(display::calling_screen::<S, V>))
            .route("/api/antrian/poli/{kd_ruang_poli}", get(display::room_queue::<S, V>))
            .route("/api/stats", get(display::stats::<S, V>))
            // call and status actions
            .route("/api/panggilpoli", post(call::call_patient::<S, V>))
            .route("/api/panggilpasien", post(call::call_patient::<S, V>))
            .route("/api/antrian/panggil", post(call::call_patient::<S, V>))
            .route("/api/log", post(call::update_status::<S, V>))
            .route("/api/antrian/log", post(call::update_status::<S, V>))
            .route("/api/log/reset/{no_rawat}", post(call::reset_status::<S, V>))
            .route("/api/antrian/log/reset/{no_rawat}", post(call::reset_status::<S, V>))
            // settings
            .route(
                "/api/display/",
                get(settings::list_displays::<S, V>)
                    .post(settings::add_display::<S, V>)
                    .put(settings::edit_display::<S, V>),
            )
            .route("/api/display/{kd_display}", delete(settings::delete_display::<S, V>))
            .route(
                "/api/poli/",
                get(settings::list_rooms::<S, V>)
                    .post(settings::add_room::<S, V>)
                    .put(settings::edit_room::<S, V>),
            )
            .route("/api/poli/{kd_ruang_poli}", delete(settings::delete_room::<S, V>))
            .route("/api/poli/dokter/{kd_ruang_poli}", get(settings::room_doctors::<S, V>))
            .route(
                "/api/dokterpoli/",
                get(settings::doctor_positions::<S, V>).post(settings::place_doctor::<S, V>),
            )
            .route("/api/jadwal/dokter/all", get(settings::schedules::<S, V>))
            .route("/api/jadwal/dokter", get(settings::search_doctor::<S, V>))
            .route(
                "/api/jadwal/",
                post(settings::add_schedule::<S, V>)
                    .put(settings::change_schedule::<S, V>)
                    .delete(settings::delete_schedule::<S, V>),
            )
            .with_state(self.state.clone());

        let mut app = api.nest_service("/assets", ServeDir::new(&self.config.assets_dir));
        if self.config.audio_dir.strip_prefix(&self.config.assets_dir).is_err() {
            app = app.nest_service(AUDIO_ROUTE, ServeDir::new(&self.config.audio_dir));
        }

        let index = self.config.spa_dir.join("index.html");
        let spa = ServeDir::new(&self.config.spa_dir).not_found_service(ServeFile::new(index));
        app.fallback_service(spa)
            .layer(cors_layer(&self.config.cors_origin))
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            addr = %addr,
            app_url = self.config.app_url.as_deref().unwrap_or("-"),
            mode = ?self.config.registry.delivery_mode,
            "Queue display server listening"
        );

        let app = self.router();
        let result = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
            })
            .await;

        self.state.status.cancel_all().await;
        result?;
        Ok(())
    }
}

impl<S, V> Drop for QueueServer<S, V> {
    fn drop(&mut self) {
        self.router_task.abort();
    }
}

/// URL prefix for generated audio
///
/// Audio inside the assets directory is reachable under `/assets`; anything
/// else gets its own mount.
fn audio_url_prefix(config: &ServerConfig) -> String {
    match config.audio_dir.strip_prefix(&config.assets_dir) {
        Ok(relative) if relative == Path::new("") => "/assets".to_string(),
        Ok(relative) => format!("/assets/{}", relative.to_string_lossy().replace('\\', "/")),
        Err(_) => AUDIO_ROUTE.to_string(),
    }
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    match HeaderValue::from_str(origin) {
        Ok(value) if origin != "*" => layer.allow_origin(value),
        _ => layer.allow_origin(Any),
    }
}
