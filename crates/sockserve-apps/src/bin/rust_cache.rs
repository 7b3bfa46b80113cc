#![deny(unsafe_code)]

//! `rust-cache` — demo service reporting the `rust` language tag.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sockserve_apps::run(sockserve_apps::RUST_CACHE).await
}
