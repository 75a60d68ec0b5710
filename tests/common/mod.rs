#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::minio::MinIO;
use testcontainers_modules::mongo::Mongo;

use acsoguard::app::{build_router, AppState};
use acsoguard::auth::jwt::JwtKeys;
use acsoguard::auth::models::Role;
use acsoguard::auth::password::hash_password;
use acsoguard::db::indexes::ensure_indexes;
use acsoguard::db::models::{new_id, User};
use acsoguard::notify::LogNotifier;
use acsoguard::storage::client::{S3StorageClient, StorageClient};

pub const PASSWORD: &str = "correct horse battery";

/// Holds running containers and provides the Axum router for integration tests.
///
/// Containers are kept alive for as long as this struct lives. When dropped,
/// containers are stopped and cleaned up automatically.
pub struct TestEnv {
    _mongo: ContainerAsync<Mongo>,
    _minio: ContainerAsync<MinIO>,
    pub router: Router,
    pub state: AppState,
}

/// An account created through the API, with its bearer token.
pub struct Account {
    pub id: String,
    pub tenant_id: String,
    pub token: String,
}

impl TestEnv {
    /// Spin up MongoDB and MinIO and build the router wired to them.
    pub async fn start() -> Self {
        let (mongo_container, minio_container) =
            tokio::join!(Mongo::default().start(), MinIO::default().start());
        let mongo_container = mongo_container.expect("Failed to start MongoDB container");
        let minio_container = minio_container.expect("Failed to start MinIO container");

        // --- MongoDB ---
        let mongo_port = mongo_container
            .get_host_port_ipv4(27017)
            .await
            .expect("Failed to get MongoDB port");
        let mongo_uri = format!("mongodb://127.0.0.1:{}", mongo_port);
        let mongo_client = mongodb::Client::with_uri_str(&mongo_uri)
            .await
            .expect("Failed to connect to MongoDB");
        let mongo_db = mongo_client.database("acsoguard_test");
        ensure_indexes(&mongo_db)
            .await
            .expect("Failed to create indexes");

        // --- MinIO (S3) ---
        let minio_port = minio_container
            .get_host_port_ipv4(9000)
            .await
            .expect("Failed to get MinIO port");
        let minio_endpoint = format!("http://127.0.0.1:{}", minio_port);

        // Set env vars for AWS SDK to pick up MinIO credentials
        unsafe {
            std::env::set_var("AWS_ACCESS_KEY_ID", "minioadmin");
            std::env::set_var("AWS_SECRET_ACCESS_KEY", "minioadmin");
            std::env::set_var("AWS_REGION", "us-east-1");
        }

        let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .endpoint_url(&minio_endpoint)
            .region(aws_config::Region::new("us-east-1"))
            .load()
            .await;

        let s3_client = aws_sdk_s3::Client::from_conf(
            aws_sdk_s3::config::Builder::from(&s3_config)
                .force_path_style(true)
                .build(),
        );

        let bucket_name = "acsoguard-test";
        let _ = s3_client.create_bucket().bucket(bucket_name).send().await;

        let storage: Arc<dyn StorageClient> =
            Arc::new(S3StorageClient::new(s3_client, bucket_name.to_string()));

        let state = AppState::with_mongo(
            &mongo_db,
            storage,
            Arc::new(LogNotifier),
            JwtKeys::new("integration-secret", 1),
            64,
        );
        let router = build_router(state.clone(), None, &[]);

        Self {
            _mongo: mongo_container,
            _minio: minio_container,
            router,
            state,
        }
    }

    /// Build an `axum_test::TestServer` from this environment's router.
    pub fn server(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .expect_success_by_default()
            .try_build(self.router.clone())
            .expect("Failed to build TestServer")
    }

    /// Build a `TestServer` that does NOT expect success by default (for error tests).
    pub fn server_permissive(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .try_build(self.router.clone())
            .expect("Failed to build TestServer")
    }

    /// Build a `TestServer` on a real HTTP listener, needed for WebSocket upgrades.
    pub fn server_http(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .http_transport()
            .try_build(self.router.clone())
            .expect("Failed to build HTTP TestServer")
    }

    /// Helper: register a tenant admin.
    pub async fn register_admin(&self, server: &axum_test::TestServer, email: &str) -> Account {
        let body: Value = server
            .post("/api/auth/register")
            .json(&json!({ "name": "Admin", "email": email, "password": PASSWORD }))
            .await
            .json();
        account_from(&body)
    }

    /// Helper: register an admin, start a trial and create one site.
    ///
    /// Returns the admin and the site id.
    pub async fn tenant_with_site(&self, server: &axum_test::TestServer, email: &str) -> (Account, String) {
        let admin = self.register_admin(server, email).await;
        server
            .post("/api/subscriptions/trial")
            .authorization_bearer(&admin.token)
            .await;
        let site = self.create_site(server, &admin, "Headquarters").await;
        (admin, site)
    }

    pub async fn create_site(&self, server: &axum_test::TestServer, admin: &Account, name: &str) -> String {
        let body: Value = server
            .post("/api/sites")
            .authorization_bearer(&admin.token)
            .json(&json!({ "name": name, "address": "1 Main Street" }))
            .await
            .json();
        body["_id"].as_str().expect("site id").to_string()
    }

    /// Helper: create a staff account at `site_id` and log it in.
    pub async fn create_staff(
        &self,
        server: &axum_test::TestServer,
        admin: &Account,
        site_id: &str,
        role: &str,
        email: &str,
    ) -> Account {
        server
            .post("/api/auth/staff")
            .authorization_bearer(&admin.token)
            .json(&json!({
                "name": "Staff",
                "email": email,
                "password": PASSWORD,
                "role": role,
                "site_id": site_id,
            }))
            .await;
        self.login(server, email).await
    }

    pub async fn login(&self, server: &axum_test::TestServer, email: &str) -> Account {
        let body: Value = server
            .post("/api/auth/login")
            .json(&json!({ "email": email, "password": PASSWORD }))
            .await
            .json();
        account_from(&body)
    }

    /// Helper: insert a platform operator directly; there is no API for it.
    pub async fn super_admin(&self) -> Account {
        let id = new_id();
        let user = User {
            id: id.clone(),
            email: format!("root-{id}@acsoguard.test"),
            password_hash: hash_password(PASSWORD).await.expect("hash"),
            name: "Root".into(),
            phone: None,
            role: Role::SuperAdmin,
            tenant_id: id.clone(),
            site_id: None,
            is_active: true,
            created_at: Utc::now(),
        };
        self.state.users.insert(&user).await.expect("insert super admin");
        Account {
            token: self.state.jwt.issue(&user).expect("token"),
            tenant_id: id.clone(),
            id,
        }
    }

    /// Helper: check a visitor in and return the response body.
    pub async fn check_in(&self, server: &axum_test::TestServer, token: &str, site_id: &str, first: &str, last: &str) -> Value {
        server
            .post("/api/visitors/check-in")
            .authorization_bearer(token)
            .json(&json!({
                "site_id": site_id,
                "first_name": first,
                "last_name": last,
                "host_name": "Grace Hopper",
                "purpose": "Interview",
            }))
            .await
            .json()
    }
}

fn account_from(body: &Value) -> Account {
    Account {
        id: body["user"]["id"].as_str().expect("user id").to_string(),
        tenant_id: body["user"]["tenant_id"].as_str().expect("tenant id").to_string(),
        token: body["token"].as_str().expect("token").to_string(),
    }
}
