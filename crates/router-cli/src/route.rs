//! `router route` — stdin/stdout single-shot protocol (§6): one JSON
//! request on stdin, one JSON response on a single line of stdout. Exit
//! code is advisory; the envelope is authoritative (§6, §4.6 edge rules).

use std::io::Read;

use crate::setup;

pub async fn run() -> anyhow::Result<i32> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .map_err(|e| anyhow::anyhow!("failed to read stdin: {e}"))?;

    let response = match router_policy::Router::parse_request(&raw) {
        Ok(request) => {
            let config = setup::load_config();
            let router = setup::build_router(&config)?;
            router.handle(request).await
        }
        Err(response) => response,
    };

    let exit_code = if response.is_success() { 0 } else { 1 };
    println!("{}", serde_json::to_string(&response)?);
    Ok(exit_code)
}
