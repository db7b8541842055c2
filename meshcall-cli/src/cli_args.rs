use clap::{Args, Parser, Subcommand};
use meshcall_client::MeetingConfig;
use url::Url;

/// Meshcall CLI
///
/// Joins a meshcall room as a full mesh participant. Every other
/// participant gets a direct WebRTC connection from this process.
#[derive(Parser, Debug)]
#[clap(name = "meshcall")]
pub struct Opt {
    #[clap(subcommand)]
    pub mode: Mode,
}

#[derive(Subcommand, Debug)]
pub enum Mode {
    /// Join a room and stay until the meeting ends or you press `q`.
    Join(Join),

    /// Ask the meeting API for the ICE servers a session would use.
    IceServers(Api),
}

/// Connection settings shared by every mode. Anything not given here comes
/// from the YAML file in `--config` / `MESHCALL_CONFIG_PATH`, then from the
/// environment, then from the built-in defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct Api {
    /// YAML config file.
    #[clap(long = "config", short = 'c')]
    pub config: Option<String>,

    /// Meeting API base URL, e.g. http://localhost:8081
    #[clap(long = "api-url")]
    pub api_url: Option<Url>,

    /// Bearer token for the meeting API. Cookie auth is used without one.
    #[clap(long = "api-token")]
    pub api_token: Option<String>,
}

impl Api {
    pub fn meeting_config(&self) -> anyhow::Result<MeetingConfig> {
        let mut config = match &self.config {
            Some(path) => MeetingConfig::from_file(path)?,
            None => MeetingConfig::from_env_or_default()?,
        };
        if let Some(url) = &self.api_url {
            config.api_base_url = url.as_str().trim_end_matches('/').to_string();
        }
        if let Some(token) = &self.api_token {
            config.api_token = Some(token.clone());
        }
        Ok(config)
    }
}

#[derive(Args, Debug, Clone)]
pub struct Join {
    /// Room to join.
    #[clap(long = "room", short = 'r')]
    pub room: Option<String>,

    /// Name shown to the other participants.
    #[clap(long = "name", short = 'n')]
    pub name: Option<String>,

    /// Signaling WebSocket base URL; the room is appended as the last path
    /// segment.
    #[clap(long = "signaling-url")]
    pub signaling_url: Option<Url>,

    /// Join without capturing anything; you still receive everyone else.
    #[clap(long = "view-only")]
    pub view_only: bool,

    /// Skip the meeting API and use the configured public STUN servers.
    #[clap(long = "no-api")]
    pub no_api: bool,

    #[clap(flatten)]
    pub api: Api,
}

impl Join {
    /// The file/env config with command-line overrides applied.
    pub fn meeting_config(&self) -> anyhow::Result<MeetingConfig> {
        let mut config = self.api.meeting_config()?;
        if let Some(room) = &self.room {
            config.room = room.clone();
        }
        if let Some(name) = &self.name {
            config.display_name = name.clone();
        }
        if let Some(url) = &self.signaling_url {
            config.signaling_url = url.to_string();
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_overrides() {
        let opt = Opt::try_parse_from([
            "meshcall",
            "join",
            "--room",
            "standup",
            "--name",
            "Ada Lovelace",
            "--signaling-url",
            "wss://signal.example.com/rooms",
            "--view-only",
        ])
        .unwrap();
        let Mode::Join(join) = opt.mode else {
            panic!("expected join");
        };
        assert!(join.view_only);
        assert!(!join.no_api);

        let config = join.meeting_config().unwrap();
        assert_eq!(config.room, "standup");
        assert_eq!(config.display_name, "Ada Lovelace");
        assert_eq!(
            config.room_url().unwrap().as_str(),
            "wss://signal.example.com/rooms/standup?name=Ada+Lovelace"
        );
    }

    #[test]
    fn test_rejects_bad_signaling_url() {
        assert!(Opt::try_parse_from(["meshcall", "join", "--signaling-url", "not a url"]).is_err());
    }

    #[test]
    fn test_ice_servers_mode() {
        let opt = Opt::try_parse_from([
            "meshcall",
            "ice-servers",
            "--api-url",
            "http://localhost:9000/",
            "--api-token",
            "t0k",
        ])
        .unwrap();
        let Mode::IceServers(api) = opt.mode else {
            panic!("expected ice-servers");
        };
        let config = api.meeting_config().unwrap();
        assert_eq!(config.api_base_url, "http://localhost:9000");
        assert_eq!(config.api_token.as_deref(), Some("t0k"));
    }
}
