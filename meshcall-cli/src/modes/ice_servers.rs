/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

use meshcall_cli::cli_args::Api;
use meshcall_client::api_client;
use tracing::warn;

pub async fn ice_servers(opt: Api) -> anyhow::Result<()> {
    let config = opt.meeting_config()?;
    let client = api_client(&config);
    if let Err(e) = client.check_session().await {
        warn!("Session check against {} failed: {e}", client.base_url());
    }
    let servers = client.ice_servers().await?;
    println!("{} ICE servers from {}:", servers.len(), client.base_url());
    for server in servers {
        let kind = if server.is_relay() { "relay" } else { "stun" };
        let auth = if server.credential.is_some() {
            " (with credential)"
        } else {
            ""
        };
        println!("  [{kind}] {}{auth}", server.urls.join(", "));
    }
    Ok(())
}
