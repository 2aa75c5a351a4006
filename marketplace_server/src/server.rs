use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::info;
use marketplace_engine::{
    events::{EventHandlers, EventHooks, EventProducers, NotificationHub},
    gateway::GatewayRegistry,
    OrderFlowApi,
    PaymentFlowApi,
    SqliteDatabase,
};

use crate::{
    auth::TokenIssuer,
    config::ServerConfig,
    errors::ServerError,
    middleware::JwtMiddlewareFactory,
    routes::{
        health,
        AssignOrderRoute,
        CreateOrderRoute,
        InitiatePaymentRoute,
        RefundPaymentRoute,
        UpdateOrderStatusRoute,
    },
    ws::notifications_ws,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;

    // The delivery pipeline: flow APIs write to the producers, the handler task forwards into the
    // hub, the hub fans out to live connections. Nothing in a request path waits on any of it.
    let hub = NotificationHub::new(config.event_buffer_size);
    let mut hooks = EventHooks::default();
    hooks.on_notification = Some(hub.forwarding_hook());
    let handlers = EventHandlers::new(config.event_buffer_size, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    info!("🚀️ Notification delivery pipeline is up");

    let srv = create_server_instance(config, db, hub, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    hub: NotificationHub,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone());
        let payments_api = PaymentFlowApi::new(db.clone(), GatewayRegistry::simulated(), producers.clone())
            .with_gateway_timeout(config.gateway_timeout);
        let issuer = TokenIssuer::new(&config.auth);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("smp::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(payments_api))
            .app_data(web::Data::new(issuer.clone()))
            .app_data(web::Data::new(hub.clone()));
        // Routes that require authentication
        let api_scope = web::scope("/api")
            .wrap(JwtMiddlewareFactory::new(issuer))
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(InitiatePaymentRoute::<SqliteDatabase>::new())
            .service(RefundPaymentRoute::<SqliteDatabase>::new())
            .service(AssignOrderRoute::<SqliteDatabase>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase>::new());
        app.service(health).route("/ws", web::get().to(notifications_ws)).service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    info!("🚀️ Server listening on {host}:{port}");
    Ok(srv)
}
