//! User Routes
//!
//! The request handlers for the User feature and the function that registers
//! them on a [`Router`].
//!
//! ## Routes
//!
//! ```text
//! PING   /                         "PONG"
//! GET    /users                    [user, ...]
//! GET    /users/:id                user
//! GET    /users/count              {"count": n}
//! GET    /users/by-name/:name      [user, ...]
//! GET    /users/by-email/:email    user
//! POST   /users <name> <email>     created user
//! PUT    /users/:id <name> <email> updated user
//! DELETE /users/:id                deleted user
//! ```

use crate::protocol::Request;
use crate::router::{reply, Handler, HandlerError, HandlerResult, Router, RouterError};
use crate::users::store::{StoreError, UserStore};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;

impl From<StoreError> for HandlerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => HandlerError::NotFound(err.to_string()),
            StoreError::Unavailable(_) => HandlerError::Unavailable(err.to_string()),
        }
    }
}

/// Registers every user route on `router`, backed by `store`.
pub fn register_routes(router: &mut Router, store: Arc<dyn UserStore>) -> Result<(), RouterError> {
    router.register("PING", "/", |_req: Request| async { reply("PONG") })?;
    router.register("GET", "/users", with_store(&store, list_users))?;
    router.register("GET", "/users/:id", with_store(&store, get_user))?;
    router.register("GET", "/users/count", with_store(&store, count_users))?;
    router.register("GET", "/users/by-name/:name", with_store(&store, find_users))?;
    router.register("GET", "/users/by-email/:email", with_store(&store, find_user_by_email))?;
    router.register("POST", "/users", with_store(&store, create_user))?;
    router.register("PUT", "/users/:id", with_store(&store, update_user))?;
    router.register("DELETE", "/users/:id", with_store(&store, delete_user))?;
    Ok(())
}

/// Binds a store-taking handler function to a concrete store.
fn with_store<F, Fut>(store: &Arc<dyn UserStore>, handler: F) -> impl Handler
where
    F: Fn(Arc<dyn UserStore>, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    let store = Arc::clone(store);
    move |request: Request| handler(Arc::clone(&store), request)
}

async fn list_users(store: Arc<dyn UserStore>, _request: Request) -> HandlerResult {
    reply(&store.list().await?)
}

async fn get_user(store: Arc<dyn UserStore>, request: Request) -> HandlerResult {
    let id = required_param(&request, "id")?;
    reply(&store.get(id).await?)
}

async fn count_users(store: Arc<dyn UserStore>, _request: Request) -> HandlerResult {
    let count = store.count().await?;
    Ok(json!({ "count": count }))
}

async fn find_users(store: Arc<dyn UserStore>, request: Request) -> HandlerResult {
    let name = required_param(&request, "name")?;
    reply(&store.find_by_name(name).await?)
}

async fn find_user_by_email(store: Arc<dyn UserStore>, request: Request) -> HandlerResult {
    let email = required_param(&request, "email")?;
    reply(&store.find_by_email(email).await?)
}

async fn create_user(store: Arc<dyn UserStore>, request: Request) -> HandlerResult {
    let (name, email) = name_and_email(&request)?;
    reply(&store.create(name, email).await?)
}

async fn update_user(store: Arc<dyn UserStore>, request: Request) -> HandlerResult {
    let id = required_param(&request, "id")?.to_string();
    let (name, email) = name_and_email(&request)?;
    reply(&store.update(id, name, email).await?)
}

async fn delete_user(store: Arc<dyn UserStore>, request: Request) -> HandlerResult {
    let id = required_param(&request, "id")?;
    reply(&store.delete(id).await?)
}

fn required_param<'a>(request: &'a Request, name: &str) -> Result<&'a str, HandlerError> {
    request
        .param(name)
        .ok_or_else(|| HandlerError::InvalidArgument(format!("missing path parameter :{}", name)))
}

/// Reads `<name> <email>` from the first two positional arguments.
fn name_and_email(request: &Request) -> Result<(String, String), HandlerError> {
    let positional = request.args().len() - request.params().len();
    if positional != 2 {
        return Err(HandlerError::InvalidArgument(format!(
            "expected <name> <email>, got {} argument(s)",
            positional
        )));
    }

    let name = request.args()[0].clone();
    let email = request.args()[1].clone();
    if !email.contains('@') {
        return Err(HandlerError::InvalidArgument(format!(
            "invalid email address: {}",
            email
        )));
    }
    Ok((name, email))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::code;
    use crate::users::store::{InMemoryUserStore, StoreFuture, User};
    use futures::future::{self, FutureExt};

    fn seeded_router() -> (Router, Arc<InMemoryUserStore>) {
        let store = Arc::new(InMemoryUserStore::new());
        store.insert(User::new("7", "ariz", "ariz@example.com")).unwrap();
        store.insert(User::new("42", "grace", "grace@example.com")).unwrap();

        let mut router = Router::new();
        register_routes(&mut router, Arc::clone(&store) as Arc<dyn UserStore>).unwrap();
        (router, store)
    }

    /// A store whose backend is always down.
    struct OfflineStore;

    impl UserStore for OfflineStore {
        fn list(&self) -> StoreFuture<'_, Vec<User>> {
            future::ready(Err(offline())).boxed()
        }
        fn get<'a>(&'a self, _id: &'a str) -> StoreFuture<'a, User> {
            future::ready(Err(offline())).boxed()
        }
        fn find_by_name<'a>(&'a self, _name: &'a str) -> StoreFuture<'a, Vec<User>> {
            future::ready(Err(offline())).boxed()
        }
        fn find_by_email<'a>(&'a self, _email: &'a str) -> StoreFuture<'a, User> {
            future::ready(Err(offline())).boxed()
        }
        fn create(&self, _name: String, _email: String) -> StoreFuture<'_, User> {
            future::ready(Err(offline())).boxed()
        }
        fn update(&self, _id: String, _name: String, _email: String) -> StoreFuture<'_, User> {
            future::ready(Err(offline())).boxed()
        }
        fn delete<'a>(&'a self, _id: &'a str) -> StoreFuture<'a, User> {
            future::ready(Err(offline())).boxed()
        }
        fn count(&self) -> StoreFuture<'_, usize> {
            future::ready(Err(offline())).boxed()
        }
    }

    fn offline() -> StoreError {
        StoreError::Unavailable("connection refused".into())
    }

    #[tokio::test]
    async fn test_get_one() {
        let (router, _) = seeded_router();

        let dispatch = router.prepare("GET /users/7").unwrap();
        assert_eq!(dispatch.request().args(), ["7"]);

        let response = dispatch.run().await;
        assert_eq!(
            response.encode(),
            r#"OK {"id":"7","name":"ariz","email":"ariz@example.com"}"#
        );
    }

    #[tokio::test]
    async fn test_list_all() {
        let (router, _) = seeded_router();

        let response = router.handle("GET /users").await;
        assert_eq!(
            response.encode(),
            concat!(
                r#"OK [{"id":"7","name":"ariz","email":"ariz@example.com"},"#,
                r#"{"id":"42","name":"grace","email":"grace@example.com"}]"#
            )
        );
    }

    #[tokio::test]
    async fn test_count_is_not_shadowed_by_id() {
        let (router, _) = seeded_router();
        assert_eq!(router.handle("GET /users/count").await.encode(), r#"OK {"count":2}"#);
    }

    #[tokio::test]
    async fn test_find_by_name() {
        let (router, _) = seeded_router();
        let response = router.handle("GET /users/by-name/grace").await;
        assert_eq!(
            response.encode(),
            r#"OK [{"id":"42","name":"grace","email":"grace@example.com"}]"#
        );
        assert_eq!(router.handle("GET /users/by-name/nobody").await.encode(), "OK []");
    }

    #[tokio::test]
    async fn test_find_by_email() {
        let (router, _) = seeded_router();
        assert_eq!(
            router.handle("GET /users/by-email/ariz@example.com").await.encode(),
            r#"OK {"id":"7","name":"ariz","email":"ariz@example.com"}"#
        );
        assert_eq!(
            router.handle("GET /users/by-email/nobody@example.com").await.encode(),
            "ERR NOT_FOUND user nobody@example.com not found"
        );
    }

    #[tokio::test]
    async fn test_missing_user() {
        let (router, _) = seeded_router();
        assert_eq!(
            router.handle("GET /users/1000").await.encode(),
            "ERR NOT_FOUND user 1000 not found"
        );
    }

    #[tokio::test]
    async fn test_create_update_delete() {
        let (router, store) = seeded_router();

        let created = router.handle("POST /users linus linus@example.com").await;
        assert_eq!(
            created.encode(),
            r#"OK {"id":"43","name":"linus","email":"linus@example.com"}"#
        );

        let updated = router.handle("PUT /users/43 linus torvalds@example.com").await;
        assert_eq!(
            updated.encode(),
            r#"OK {"id":"43","name":"linus","email":"torvalds@example.com"}"#
        );

        let deleted = router.handle("DELETE /users/43").await;
        assert!(deleted.is_ok());
        assert_eq!(store.count().await.unwrap(), 2);

        assert_eq!(
            router.handle("DELETE /users/43").await.code(),
            Some(code::NOT_FOUND)
        );
    }

    #[tokio::test]
    async fn test_create_validates_arguments() {
        let (router, _) = seeded_router();

        let response = router.handle("POST /users linus").await;
        assert_eq!(
            response.encode(),
            "ERR INVALID_ARGUMENT expected <name> <email>, got 1 argument(s)"
        );

        let response = router.handle("POST /users linus not-an-email").await;
        assert_eq!(response.code(), Some(code::INVALID_ARGUMENT));

        let response = router.handle("PUT /users/7 ariz").await;
        assert_eq!(response.code(), Some(code::INVALID_ARGUMENT));
    }

    #[tokio::test]
    async fn test_ping() {
        let (router, _) = seeded_router();
        assert_eq!(router.handle("ping /").await.encode(), r#"OK "PONG""#);
    }

    #[tokio::test]
    async fn test_store_outage_becomes_error_response() {
        let mut router = Router::new();
        register_routes(&mut router, Arc::new(OfflineStore)).unwrap();

        for raw in [
            "GET /users",
            "GET /users/7",
            "GET /users/by-email/a@b.c",
            "POST /users a a@b.c",
            "GET /users/count",
        ] {
            assert_eq!(
                router.handle(raw).await.encode(),
                "ERR UNAVAILABLE store unavailable: connection refused",
                "{raw}"
            );
        }
    }

    #[test]
    fn test_routes_registered_once() {
        let (mut router, store) = seeded_router();
        assert_eq!(router.len(), 9);
        assert!(matches!(
            register_routes(&mut router, store),
            Err(RouterError::DuplicateRoute { .. })
        ));
    }
}
