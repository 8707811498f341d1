use std::sync::Arc;

use keeper_core::proto::*;
use keeper_core::{CoreError, PROTOCOL_VERSION};
use keeper_ipc::framing;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::app::App;

/// Accepts connections until a `Shutdown` request or Ctrl-C, then stops the server.
pub async fn serve(listener: UnixListener, app: Arc<App>) -> std::io::Result<()> {
    let shutdown = Arc::new(Notify::new());
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _addr) = accepted?;
                let app = Arc::clone(&app);
                let shutdown = Arc::clone(&shutdown);
                tokio::spawn(async move {
                    if let Err(err) = handle_conn(stream, app, shutdown).await {
                        debug!("connection ended with error: {err}");
                    }
                });
            }
            _ = shutdown.notified() => {
                info!("shutdown requested");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    app.supervisor.shutdown().await;
    Ok(())
}

async fn handle_conn(
    stream: UnixStream,
    app: Arc<App>,
    shutdown: Arc<Notify>,
) -> std::io::Result<()> {
    let mut framed = framing::framed(stream);
    while let Some(request) = framing::read_request(&mut framed).await? {
        let id = request.id;
        let stop_daemon = matches!(request.payload, Request::Shutdown {});
        let payload = dispatch(&app, request.payload).await;
        framing::send_response(&mut framed, &Envelope { id, payload }).await?;
        if stop_daemon {
            shutdown.notify_one();
        }
    }
    Ok(())
}

pub async fn dispatch(app: &App, request: Request) -> Response {
    match handle(app, request).await {
        Ok(response) => response,
        Err(err) => {
            warn!(code = ?err.code, "request failed: {}", err.message);
            Response::Error(err)
        }
    }
}

async fn handle(app: &App, request: Request) -> Result<Response, RpcError> {
    let response = match request {
        Request::Ping {
            client_version,
            protocol_version,
        } => {
            if protocol_version != PROTOCOL_VERSION {
                return Err(CoreError::UnsupportedProtocol {
                    client: protocol_version,
                    daemon: PROTOCOL_VERSION,
                }
                .into());
            }
            debug!(%client_version, "ping");
            Response::Pong {
                daemon_version: env!("CARGO_PKG_VERSION").to_string(),
                protocol_version: PROTOCOL_VERSION,
            }
        }

        Request::Status {} => Response::Status {
            daemon: app.daemon_status(),
            server: app.supervisor.status().await,
        },

        Request::Start {} => Response::Start(app.supervisor.start().await?),
        Request::Stop {} => Response::Stop(app.supervisor.stop().await?),
        Request::Restart {} => Response::Restart(app.supervisor.restart().await?),
        Request::Setup {} => Response::Setup(app.supervisor.setup().await),

        Request::RconExec { command } => {
            let command = command.trim();
            if command.is_empty() {
                return Err(RpcError::new(ErrorCode::BadRequest, "empty command"));
            }
            Response::RconResult {
                text: app.supervisor.execute(command).await?,
            }
        }
        Request::OnlinePlayers {} => Response::OnlinePlayers(app.supervisor.online_players().await?),

        Request::LogsTail { lines } => {
            let (lines, truncated) = app.logs.tail_console(lines);
            Response::LogsTail { lines, truncated }
        }
        Request::DaemonLogsTail { lines } => {
            let (lines, truncated) = app.logs.tail_daemon(lines);
            Response::LogsTail { lines, truncated }
        }

        Request::CreateBackup { upload } => Response::Backup(app.backups.create_backup(upload).await),
        Request::ListBackups { location } => {
            Response::Backups(app.backups.list_backups(location).await?)
        }
        Request::DeleteBackups { location, names } => Response::Deleted {
            outcomes: app.backups.delete_backups(location, &names).await,
        },
        Request::RestoreBackup { name } => Response::Restore(app.backups.restore_backup(&name).await),

        Request::Link {
            account_id,
            username,
        } => {
            let profile = app.identity.link(&account_id, &username).await?;
            Response::Profile {
                account_id,
                profile,
            }
        }
        Request::Unlink { account_id } => {
            app.identity.remove(&account_id).await?;
            Response::Unlinked { account_id }
        }
        Request::Promote { account_id, tier } => {
            let profile = app.identity.promote(&account_id, tier).await?;
            Response::Profile {
                account_id,
                profile,
            }
        }
        Request::Demote { account_id, tier } => {
            let profile = app.identity.demote(&account_id, tier).await?;
            Response::Profile {
                account_id,
                profile,
            }
        }
        Request::Profile { account_id } => {
            let profile = app.identity.get(&account_id).await?;
            Response::Profile {
                account_id,
                profile,
            }
        }
        Request::Profiles {} => Response::Profiles {
            entries: app.identity.get_all().await,
        },
        Request::WhoIs { username } => {
            let entry = app.identity.find_by_username(&username).await.ok_or_else(|| {
                RpcError::new(ErrorCode::NotFound, format!("{username} is not linked"))
            })?;
            Response::Profile {
                account_id: entry.account_id,
                profile: entry.profile,
            }
        }
        Request::SyncMembers { member_ids } => Response::Sync(app.identity.sync(&member_ids).await?),

        Request::Shutdown {} => Response::ShutdownAck {},
    };
    Ok(response)
}
