//! Login round trips through a session file, as the command-line client
//! does them.

use std::{sync::Arc, time::Duration};

use serde_json::json;
use spotistat::{
    api::WebApi,
    auth::Authorizer,
    config::Config,
    error::ErrorKind,
    session::{SessionGuard, TokenProvider},
    store::{FileStore, KeyValueStore, ACCESS_TOKEN_KEY, AUTH_STATE_KEY, TOKEN_EXPIRATION_KEY},
};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config() -> Config {
    let mut config = Config::from_toml(
        r#"
            client_id = "0123abcd"
            redirect_uri = "http://127.0.0.1:8888/callback"
        "#,
    )
    .unwrap();
    config.retry_delay = Duration::from_millis(10);
    config
}

/// What a process of the command-line client holds.
struct Process {
    store: Arc<dyn KeyValueStore>,
    session: Arc<SessionGuard>,
    authorizer: Authorizer,
}

fn start(config: &Config, dir: &TempDir) -> Process {
    let store: Arc<dyn KeyValueStore> =
        Arc::new(FileStore::open(dir.path().join("session.toml")).unwrap());
    let session = Arc::new(SessionGuard::new(Arc::clone(&store)).unwrap());
    let authorizer = Authorizer::new(config, Arc::clone(&store), Arc::clone(&session));
    Process {
        store,
        session,
        authorizer,
    }
}

fn state_of(url: &Url) -> String {
    url.query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
        .unwrap()
}

#[tokio::test]
async fn test_login_survives_a_restart() {
    let config = config();
    let dir = TempDir::new().unwrap();

    // `spotistat login`
    let login = start(&config, &dir);
    let state = state_of(&login.authorizer.authorize_url().unwrap());
    drop(login);

    // `spotistat callback <URL>`
    let callback = start(&config, &dir);
    let redirect = Url::parse(&format!(
        "http://127.0.0.1:8888/callback#access_token=BQD&token_type=Bearer&expires_in=3600&state={state}"
    ))
    .unwrap();
    callback.authorizer.complete(&redirect).unwrap();
    assert!(callback.store.get(AUTH_STATE_KEY).unwrap().is_none());
    drop(callback);

    // Any later command uses the stored token.
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer BQD"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "alice",
            "display_name": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let later = start(&config, &dir);
    assert!(later.session.is_authenticated());
    let tokens: Arc<dyn TokenProvider> = later.session.clone();
    let api = WebApi::new(
        &config.clone().with_api_url(Url::parse(&server.uri()).unwrap()),
        tokens,
    )
    .unwrap();
    assert_eq!(api.profile().await.unwrap().name(), "alice");
}

#[test]
fn test_expired_session_is_cleared_on_start() {
    let config = config();
    let dir = TempDir::new().unwrap();

    let process = start(&config, &dir);
    process.store.set(ACCESS_TOKEN_KEY, "BQD").unwrap();
    process.store.set(TOKEN_EXPIRATION_KEY, "1700000000000").unwrap();
    drop(process);

    let process = start(&config, &dir);
    assert!(!process.session.is_authenticated());
    assert!(process.store.get(ACCESS_TOKEN_KEY).unwrap().is_none());
    assert_eq!(
        process.session.access_token().unwrap_err().kind,
        ErrorKind::Unauthenticated
    );
}

#[test]
fn test_forged_callback_leaves_nothing_behind() {
    let config = config();
    let dir = TempDir::new().unwrap();

    let process = start(&config, &dir);
    process.authorizer.authorize_url().unwrap();
    let forged = Url::parse(
        "http://127.0.0.1:8888/callback#access_token=EVIL&expires_in=3600&state=guessed",
    )
    .unwrap();
    let err = process.authorizer.complete(&forged).unwrap_err();
    assert_eq!(err.kind, ErrorKind::PermissionDenied);
    drop(process);

    let contents = std::fs::read_to_string(dir.path().join("session.toml")).unwrap();
    assert!(!contents.contains("EVIL"));
    assert!(!contents.contains(AUTH_STATE_KEY));
}

#[tokio::test]
async fn test_watch_ends_an_expiring_session() {
    let config = config();
    let dir = TempDir::new().unwrap();

    let process = start(&config, &dir);
    let state = state_of(&process.authorizer.authorize_url().unwrap());
    let redirect = Url::parse(&format!(
        "http://127.0.0.1:8888/callback#access_token=BQD&expires_in=1&state={state}"
    ))
    .unwrap();
    process.authorizer.complete(&redirect).unwrap();

    let poller = Arc::clone(&process.session).watch(Duration::from_millis(100));
    tokio::time::timeout(Duration::from_secs(10), poller.stopped())
        .await
        .unwrap()
        .unwrap();

    assert!(!process.session.is_authenticated());
    assert!(process.store.get(ACCESS_TOKEN_KEY).unwrap().is_none());
}
