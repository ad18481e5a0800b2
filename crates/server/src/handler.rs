//! One task per connected viewer.
//!
//! A session starts unauthenticated and only accepts `login`. After a
//! successful login it is registered with the session registry until the
//! peer goes away, the transport fails or a frame is not even JSON.

use std::sync::Arc;

use cluster_common::I64Vec2;
use cluster_kernel::parse_planet_key;
use cluster_session::{Client, Response, Session, TransportError};
use tracing::Instrument;

use crate::engine::Engine;
use crate::request::{FrameError, Request, parse_frame};

/// Why a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    PeerClosed,
    Transport(TransportError),
    /// A frame that is not JSON.
    Malformed,
    LoginFailed,
    /// The engine stopped accepting sessions.
    Shutdown,
}

/// Drive one session from first frame to disconnect.
pub async fn handle_session(engine: Arc<Engine>, session: Arc<dyn Session>) -> SessionEnd {
    let span = tracing::info_span!("session", peer = %session.peer());
    async move {
        let client = match authenticate(&engine, &session).await {
            Ok(client) => client,
            Err(end) => {
                tracing::info!(?end, "session ended before login");
                return end;
            }
        };
        let end = serve(&engine, &client).await;
        engine.registry().remove(client.username(), client.id());
        tracing::info!(username = client.username(), ?end, "session ended");
        end
    }
    .instrument(span)
    .await
}

async fn reply(session: &Arc<dyn Session>, response: &Response) -> Result<(), SessionEnd> {
    let frame = response
        .encode()
        .map_err(|e| SessionEnd::Transport(TransportError::Encode(e)))?;
    session.send(&frame).await.map_err(SessionEnd::Transport)
}

async fn authenticate(
    engine: &Engine,
    session: &Arc<dyn Session>,
) -> Result<Arc<Client>, SessionEnd> {
    loop {
        let frame = match session.receive().await {
            Ok(Some(frame)) => frame,
            Ok(None) => return Err(SessionEnd::PeerClosed),
            Err(e) => return Err(SessionEnd::Transport(e)),
        };
        let (username, twitter_id, setup) = match parse_frame(&frame) {
            Ok(Request::Login {
                username,
                twitter_id,
                setup,
            }) => (username, twitter_id, setup),
            Ok(_) => {
                reply(session, &Response::error("login required")).await?;
                continue;
            }
            Err(FrameError::Malformed(e)) => {
                tracing::debug!(error = %e, "malformed frame");
                return Err(SessionEnd::Malformed);
            }
            Err(e @ FrameError::Invalid(_)) => {
                reply(session, &Response::error(e.to_string())).await?;
                continue;
            }
        };

        let login = match engine.login(&username, &twitter_id, setup).await {
            Ok(login) => login,
            Err(e) => {
                tracing::info!(%username, error = %e, "login failed");
                let failed = Response::LoginFailed {
                    reason: e.to_string(),
                };
                reply(session, &failed).await?;
                return Err(SessionEnd::LoginFailed);
            }
        };

        let player = login.player;
        let position = parse_planet_key(&player.home_planet)
            .map(|(x, y)| I64Vec2::new(x, y))
            .unwrap_or(I64Vec2::ZERO);
        reply(
            session,
            &Response::LoginSuccess {
                username: username.clone(),
                race_id: player.race_id,
                home_planet: player.home_planet.clone(),
                position,
            },
        )
        .await?;

        let client = Arc::new(Client::new(username, session.clone()));
        if engine.registry().add(client.clone()).is_err() {
            return Err(SessionEnd::Shutdown);
        }
        tracing::info!(username = client.username(), created = login.created, "session active");
        return Ok(client);
    }
}

async fn serve(engine: &Engine, client: &Client) -> SessionEnd {
    loop {
        let frame = match client.session().receive().await {
            Ok(Some(frame)) => frame,
            Ok(None) => return SessionEnd::PeerClosed,
            Err(e) => return SessionEnd::Transport(e),
        };
        let response = match parse_frame(&frame) {
            Ok(request) => dispatch(engine, client, request).await,
            Err(FrameError::Malformed(e)) => {
                tracing::debug!(error = %e, "malformed frame");
                return SessionEnd::Malformed;
            }
            Err(e) => Some(Response::error(e.to_string())),
        };
        if let Some(response) = response {
            if let Err(e) = client.send_response(&response).await {
                return SessionEnd::Transport(e);
            }
        }
    }
}

/// Run one request. Returns the direct reply, if any.
async fn dispatch(engine: &Engine, client: &Client, request: Request) -> Option<Response> {
    let username = client.username();
    let result = match request {
        Request::Login { .. } => return Some(Response::error("already logged in")),
        Request::ScopeOfView {
            position,
            resolution,
        } => engine.scope_of_view(position, resolution).map(Some),
        Request::VoronoiDiagram {
            position,
            resolution,
        } => engine.voronoi_diagram(position, resolution).map(Some),
        Request::StartMission {
            kind,
            start_planets,
            end_planet,
            fleet,
        } => engine
            .start_mission(username, kind, &start_planets, &end_planet, fleet)
            // the launch reaches this session through the broadcast
            .map(|_| None),
    };
    result.unwrap_or_else(|e| {
        tracing::debug!(username, error = %e, "action failed");
        Some(Response::error(e.to_string()))
    })
}
