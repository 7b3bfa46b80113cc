#![deny(unsafe_code)]

//! `python-api` — demo service reporting the `python` language tag.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sockserve_apps::run(sockserve_apps::PYTHON_API).await
}
