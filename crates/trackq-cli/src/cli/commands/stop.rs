//! `trackq stop` – stop a running instance.

use anyhow::{bail, Result};
use trackq_core::control::{self, ControlRequest};

use crate::cli::control_socket;

pub async fn run_stop() -> Result<()> {
    let path = control::default_control_socket_path()?;
    let reply = control_socket::request(&path, &ControlRequest::Stop).await?;
    match reply.trim() {
        "ok" => println!("Stop requested"),
        other => bail!("unexpected reply: {}", other),
    }
    Ok(())
}
