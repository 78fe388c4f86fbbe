use crate::domain::{Address, Amount, Timestamp};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub owner: Address,
    pub treasury: Address,
    pub team: Option<Address>,
    pub capacity: u32,
    pub multipliers: Vec<Amount>,
    pub factions: Vec<Address>,
    pub deploy_time: Timestamp,
    pub entropy_fee: Amount,
    pub oracle_mode: OracleMode,
    pub oracle_url: Option<String>,
    pub public_url: String,
    pub fulfillment_delay_ms: u64,
    pub admin_token: String,
    pub oracle_callback_token: String,
    /// Bearer tokens that authenticate each paying account.
    pub account_tokens: Vec<(Address, String)>,
    pub genesis_balances: Vec<(Address, Amount)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleMode {
    /// Draws are produced in-process.
    Local,
    /// Requests are forwarded to `ORACLE_URL`, which calls back later.
    Http,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| invalid("PORT", "must be a valid u16"))?;

        let database_path = required(&env_map, "DATABASE_PATH")?;
        let owner = parse_address("OWNER", &required(&env_map, "OWNER")?)?;
        let treasury = parse_address("TREASURY", &required(&env_map, "TREASURY")?)?;
        let team = match non_empty(&env_map, "TEAM") {
            Some(s) => parse_address("TEAM", s)?.non_zero(),
            None => None,
        };

        let capacity = env_map
            .get("CAPACITY")
            .map(|s| s.as_str())
            .unwrap_or("1")
            .parse::<u32>()
            .map_err(|_| invalid("CAPACITY", "must be a valid u32"))?;

        let multipliers = split_list(env_map.get("MULTIPLIERS").map(|s| s.as_str()).unwrap_or("1,2,3,5,10"))
            .map(|s| parse_units("MULTIPLIERS", s))
            .collect::<Result<Vec<_>, _>>()?;

        let factions = split_list(env_map.get("FACTIONS").map(|s| s.as_str()).unwrap_or(""))
            .map(|s| parse_address("FACTIONS", s))
            .collect::<Result<Vec<_>, _>>()?;

        let deploy_time = match non_empty(&env_map, "DEPLOY_TIME") {
            Some(s) => parse_timestamp(s)?,
            None => Timestamp::now(),
        };

        let entropy_fee = parse_units(
            "ENTROPY_FEE",
            env_map.get("ENTROPY_FEE").map(|s| s.as_str()).unwrap_or("0"),
        )?;

        let oracle_mode = match env_map
            .get("ORACLE_MODE")
            .map(|s| s.as_str())
            .unwrap_or("local")
        {
            "local" => OracleMode::Local,
            "http" => OracleMode::Http,
            other => {
                return Err(invalid(
                    "ORACLE_MODE",
                    &format!("must be local or http, got {}", other),
                ))
            }
        };

        let oracle_url = non_empty(&env_map, "ORACLE_URL").map(str::to_string);
        if oracle_mode == OracleMode::Http && oracle_url.is_none() {
            return Err(ConfigError::MissingEnv("ORACLE_URL".to_string()));
        }

        let public_url = non_empty(&env_map, "PUBLIC_URL")
            .map(str::to_string)
            .unwrap_or_else(|| format!("http://127.0.0.1:{}", port));

        let fulfillment_delay_ms = env_map
            .get("FULFILLMENT_DELAY_MS")
            .map(|s| s.as_str())
            .unwrap_or("2000")
            .parse::<u64>()
            .map_err(|_| invalid("FULFILLMENT_DELAY_MS", "must be a valid u64"))?;

        let admin_token = required(&env_map, "ADMIN_TOKEN")?;
        let oracle_callback_token = required(&env_map, "ORACLE_CALLBACK_TOKEN")?;

        let account_tokens = split_list(
            env_map
                .get("ACCOUNT_TOKENS")
                .map(|s| s.as_str())
                .unwrap_or(""),
        )
        .map(parse_account_token)
        .collect::<Result<Vec<_>, _>>()?;
        for (i, (_, token)) in account_tokens.iter().enumerate() {
            if account_tokens[..i].iter().any(|(_, other)| other == token) {
                return Err(invalid("ACCOUNT_TOKENS", "tokens must be unique"));
            }
        }

        let genesis_balances = split_list(
            env_map
                .get("GENESIS_BALANCES")
                .map(|s| s.as_str())
                .unwrap_or(""),
        )
        .map(parse_balance)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Config {
            port,
            database_path,
            owner,
            treasury,
            team,
            capacity,
            multipliers,
            factions,
            deploy_time,
            entropy_fee,
            oracle_mode,
            oracle_url,
            public_url,
            fulfillment_delay_ms,
            admin_token,
            oracle_callback_token,
            account_tokens,
            genesis_balances,
        })
    }

    /// URL the remote provider posts fulfillments to.
    pub fn callback_url(&self) -> String {
        format!("{}/v1/oracle/callback", self.public_url.trim_end_matches('/'))
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue(key.to_string(), reason.to_string())
}

fn required(env_map: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    non_empty(env_map, key)
        .map(str::to_string)
        .ok_or_else(|| ConfigError::MissingEnv(key.to_string()))
}

fn non_empty<'a>(env_map: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    env_map
        .get(key)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_address(key: &str, raw: &str) -> Result<Address, ConfigError> {
    raw.parse::<Address>()
        .map_err(|e| invalid(key, &format!("{} ({})", e, raw)))
}

fn parse_units(key: &str, raw: &str) -> Result<Amount, ConfigError> {
    Amount::parse_units(raw).map_err(|e| invalid(key, &format!("{} ({})", e, raw)))
}

/// Unix seconds or RFC 3339.
fn parse_timestamp(raw: &str) -> Result<Timestamp, ConfigError> {
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Timestamp::new(secs));
    }
    let parsed = chrono::DateTime::parse_from_rfc3339(raw)
        .map_err(|_| invalid("DEPLOY_TIME", "must be unix seconds or RFC 3339"))?;
    let secs = parsed.timestamp();
    if secs < 0 {
        return Err(invalid("DEPLOY_TIME", "must not be before 1970"));
    }
    Ok(Timestamp::new(secs as u64))
}

/// `address:token`.
fn parse_account_token(entry: &str) -> Result<(Address, String), ConfigError> {
    let (addr, token) = entry
        .split_once(':')
        .ok_or_else(|| invalid("ACCOUNT_TOKENS", "entries must be address:token"))?;
    if token.is_empty() {
        return Err(invalid("ACCOUNT_TOKENS", "token must not be empty"));
    }
    Ok((
        parse_address("ACCOUNT_TOKENS", addr.trim())?,
        token.to_string(),
    ))
}

/// `address:amount`, amount in whole units.
fn parse_balance(entry: &str) -> Result<(Address, Amount), ConfigError> {
    let (addr, amount) = entry
        .split_once(':')
        .ok_or_else(|| invalid("GENESIS_BALANCES", "entries must be address:amount"))?;
    Ok((
        parse_address("GENESIS_BALANCES", addr.trim())?,
        parse_units("GENESIS_BALANCES", amount.trim())?,
    ))
}
