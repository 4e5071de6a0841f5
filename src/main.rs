//! Bloggen Backend - binary entry point
//! Delegates to the library for all app logic.

#[tokio::main]
async fn main() {
    bloggen_backend::run().await;
}
