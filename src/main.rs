//! # CBSF Server - Entry Point
//! src/main.rs
//!
//! Lee la configuración (CLI + entorno), registra las rutas base y atiende
//! hasta recibir SIGINT/SIGTERM.

use anyhow::Context;

use cbsf_server::config::Config;
use cbsf_server::server::Server;

fn main() -> anyhow::Result<()> {
    let config = Config::new();
    cbsf_server::logging::init(&config.log_level);

    tracing::info!("CBSF HTTP/1.1 Server v{}", env!("CARGO_PKG_VERSION"));
    config.print_summary();

    let server = Server::new(config).context("Error al crear el servidor")?;

    server.get("/", |_req, res| {
        res.json(r#"{"message":"Welcome to CBSF Server"}"#);
        Ok(())
    });

    server.get("/health", |_req, res| {
        res.success();
        Ok(())
    });

    server
        .install_signal_handlers()
        .context("Error al instalar el manejo de señales")?;

    // Bloquea hasta stop()
    server.run().context("Error fatal del servidor")?;

    Ok(())
}
