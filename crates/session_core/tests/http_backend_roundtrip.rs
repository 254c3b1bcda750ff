use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use session_core::{
    HttpCommandTransport, RemoteCommands, SessionChange, SessionController, SessionError,
    SessionStatus,
};
use shared::{
    domain::{Dataset, PasswordEntry},
    error::{ApiError, ErrorCode},
    protocol::{InvokeRequest, VaultCommand},
};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Default)]
struct MockVault {
    files: HashMap<String, (String, Dataset)>,
    opened: Option<(String, Dataset)>,
    commands: Vec<String>,
}

#[derive(Clone, Default)]
struct ServerState {
    vault: Arc<Mutex<MockVault>>,
}

fn reject(status: StatusCode, error: ApiError) -> Response {
    (status, Json(error)).into_response()
}

fn dataset_reply(dataset: &Dataset) -> Response {
    Json(dataset.clone()).into_response()
}

async fn handle_invoke(
    State(state): State<ServerState>,
    Json(request): Json<InvokeRequest>,
) -> Response {
    let mut vault = state.vault.lock().await;
    vault.commands.push(request.command.clone());

    let envelope = if request.args.is_empty() {
        json!({ "command": request.command })
    } else {
        json!({ "command": request.command, "args": request.args })
    };
    let command = match serde_json::from_value::<VaultCommand>(envelope) {
        Ok(command) => command,
        Err(err) => {
            return reject(
                StatusCode::BAD_REQUEST,
                ApiError::new(ErrorCode::Validation, format!("bad command: {err}")),
            )
        }
    };

    match command {
        VaultCommand::OpenDatabase { path, password } => {
            let found = vault
                .files
                .get(&path)
                .map(|(stored, dataset)| (*stored == password, dataset.clone()));
            match found {
                Some((true, dataset)) => {
                    vault.opened = Some((path, dataset.clone()));
                    dataset_reply(&dataset)
                }
                Some((false, _)) => reject(
                    StatusCode::UNAUTHORIZED,
                    ApiError::new(ErrorCode::Crypto, "wrong password"),
                ),
                None => reject(
                    StatusCode::NOT_FOUND,
                    ApiError::not_found(format!("{path} does not exist")),
                ),
            }
        }
        VaultCommand::CreateDatabase { path, password } => {
            if vault.files.contains_key(&path) {
                return reject(
                    StatusCode::BAD_REQUEST,
                    ApiError::new(ErrorCode::Io, format!("{path} already exists")),
                );
            }
            let dataset = Dataset::default();
            vault.files.insert(path.clone(), (password, dataset.clone()));
            vault.opened = Some((path, dataset.clone()));
            dataset_reply(&dataset)
        }
        VaultCommand::SaveDatabase { path, password } => match vault.opened.clone() {
            Some((_, dataset)) => {
                vault.files.insert(path, (password, dataset));
                StatusCode::OK.into_response()
            }
            // Reported as the command's value rather than an error status.
            None => Json(ApiError::new(
                ErrorCode::NoDatabaseOpened,
                "no database is opened",
            ))
            .into_response(),
        },
        VaultCommand::CloseDatabase => {
            vault.opened = None;
            StatusCode::OK.into_response()
        }
        VaultCommand::AddPasswordEntry { entry } => match vault.opened.as_mut() {
            Some((_, dataset)) => {
                dataset.entries.push(entry);
                dataset_reply(dataset)
            }
            None => reject(
                StatusCode::CONFLICT,
                ApiError::new(ErrorCode::NoDatabaseOpened, "no database is opened"),
            ),
        },
        VaultCommand::EditPasswordEntry {
            old_entry,
            new_entry,
        } => match vault.opened.as_mut() {
            Some((_, dataset)) => match dataset.entries.iter().position(|e| *e == old_entry) {
                Some(index) => {
                    dataset.entries[index] = new_entry;
                    dataset_reply(dataset)
                }
                None => reject(
                    StatusCode::NOT_FOUND,
                    ApiError::not_found("entry to edit was not found"),
                ),
            },
            None => reject(
                StatusCode::CONFLICT,
                ApiError::new(ErrorCode::NoDatabaseOpened, "no database is opened"),
            ),
        },
        VaultCommand::RemovePasswordEntry { entry } => match vault.opened.as_mut() {
            Some((_, dataset)) => match dataset.entries.iter().position(|e| *e == entry) {
                Some(index) => {
                    dataset.entries.remove(index);
                    dataset_reply(dataset)
                }
                None => StatusCode::NOT_FOUND.into_response(),
            },
            None => reject(
                StatusCode::CONFLICT,
                ApiError::new(ErrorCode::NoDatabaseOpened, "no database is opened"),
            ),
        },
    }
}

async fn spawn_vault_server(state: ServerState) -> Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new()
        .route("/invoke", post(handle_invoke))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

async fn seeded_server(path: &str, password: &str) -> Result<(String, ServerState)> {
    let state = ServerState::default();
    state.vault.lock().await.files.insert(
        path.to_string(),
        (
            password.to_string(),
            Dataset::new(vec![PasswordEntry::new("mail", "bob", "hunter2")]),
        ),
    );
    let url = spawn_vault_server(state.clone()).await?;
    Ok((url, state))
}

fn controller_for(url: &str) -> Arc<SessionController> {
    let transport =
        HttpCommandTransport::new(url, Duration::from_secs(5)).expect("transport");
    SessionController::new(Arc::new(transport))
}

#[tokio::test]
async fn open_edit_save_close_over_http() {
    let (url, state) = seeded_server("vault.db", "pw1").await.expect("spawn server");
    let controller = controller_for(&url);
    let mut events = controller.subscribe();

    controller.open("vault.db", "pw1").await.expect("open");
    assert_eq!(controller.snapshot().await.status, SessionStatus::Clean);

    let github = PasswordEntry::new("github", "bob", "x").with_url("https://github.com");
    controller.add_entry(&github).await.expect("add");
    let edited = PasswordEntry::new("github", "bob", "y").with_url("https://github.com");
    controller.edit_entry(&github, &edited).await.expect("edit");

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.status, SessionStatus::Dirty);
    assert_eq!(snapshot.entry_count, 2);

    controller.save("pw1").await.expect("save");
    assert!(!controller.is_dirty().await);
    controller.close().await.expect("close");
    assert!(!controller.is_open().await);

    let mut changes = Vec::new();
    while let Ok(event) = events.try_recv() {
        changes.push(event.change);
    }
    assert_eq!(
        changes,
        vec![
            SessionChange::Opened,
            SessionChange::EntryAdded,
            SessionChange::EntryEdited,
            SessionChange::Saved,
            SessionChange::Closed,
        ]
    );

    let vault = state.vault.lock().await;
    assert_eq!(
        vault.commands,
        vec![
            "open_database",
            "add_password_entry",
            "edit_password_entry",
            "save_database",
            "close_database",
        ]
    );
    let (password, stored) = vault.files.get("vault.db").expect("stored file");
    assert_eq!(password, "pw1");
    assert!(stored.contains(&edited));
    assert!(vault.opened.is_none());
}

#[tokio::test]
async fn wrong_password_keeps_session_closed() {
    let (url, _state) = seeded_server("vault.db", "pw1").await.expect("spawn server");
    let controller = controller_for(&url);

    let err = controller
        .open("vault.db", "nope")
        .await
        .expect_err("wrong password must fail");

    assert_eq!(err.remote_code(), Some(ErrorCode::Crypto));
    assert!(!controller.is_open().await);
    assert_eq!(controller.source_path().await, "");
}

#[tokio::test]
async fn missing_entry_surfaces_not_found_and_keeps_state() {
    let (url, _state) = seeded_server("vault.db", "pw1").await.expect("spawn server");
    let controller = controller_for(&url);
    controller.open("vault.db", "pw1").await.expect("open");
    let before = controller.session().await;

    let ghost = PasswordEntry::new("ghost", "nobody", "x");
    let err = controller
        .edit_entry(&ghost, &PasswordEntry::new("ghost", "nobody", "y"))
        .await
        .expect_err("edit must fail");
    assert!(err.is_not_found());

    // A bare 404 without an error body is mapped from the status code.
    let err = controller
        .remove_entry(&ghost)
        .await
        .expect_err("remove must fail");
    assert!(err.is_not_found());

    assert_eq!(controller.session().await, before);
}

#[tokio::test]
async fn cached_credential_saves_created_database() {
    let state = ServerState::default();
    let url = spawn_vault_server(state.clone()).await.expect("spawn server");
    let controller = controller_for(&url);

    controller.create("fresh.db", "pw2").await.expect("create");
    controller
        .add_entry(&PasswordEntry::new("bank", "alice", "s3cret"))
        .await
        .expect("add");
    controller
        .save_with_cached_credential()
        .await
        .expect("save with cached credential");

    assert_eq!(controller.snapshot().await.status, SessionStatus::Clean);
    let vault = state.vault.lock().await;
    let (password, stored) = vault.files.get("fresh.db").expect("stored file");
    assert_eq!(password, "pw2");
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn save_failure_reported_in_payload_keeps_session_dirty() {
    let state = ServerState::default();
    let url = spawn_vault_server(state.clone()).await.expect("spawn server");
    let controller = controller_for(&url);
    controller.create("fresh.db", "pw2").await.expect("create");
    controller
        .add_entry(&PasswordEntry::new("bank", "alice", "s3cret"))
        .await
        .expect("add");

    // The backend forgets its open database behind the controller's back.
    state.vault.lock().await.opened = None;

    let err = controller.save("pw2").await.expect_err("save must fail");
    assert!(matches!(err, SessionError::Remote(_)));
    assert_eq!(err.remote_code(), Some(ErrorCode::NoDatabaseOpened));
    assert!(controller.is_dirty().await);
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let transport =
        HttpCommandTransport::new(&format!("http://{addr}"), Duration::from_secs(2))
            .expect("transport");
    let err = transport
        .invoke("close_database", serde_json::Map::new())
        .await
        .expect_err("nothing is listening");

    assert_eq!(err.code, ErrorCode::Transport);
}
