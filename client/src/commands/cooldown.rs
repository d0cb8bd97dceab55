use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::context::Context;
use super::errors::CommandError;

/// Derives a key from the invocation context.
pub type BucketFn = Arc<dyn Fn(&Context) -> String + Send + Sync>;

/// How cooldown keys are derived from an invocation.
#[derive(Clone, Default)]
pub enum BucketType {
    /// Author and channel.
    #[default]
    Default,
    User,
    /// Fails outside a server.
    Server,
    Channel,
    /// Author and server. Fails outside a server.
    Member,
    Custom(BucketFn),
}

impl fmt::Debug for BucketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::User => f.write_str("User"),
            Self::Server => f.write_str("Server"),
            Self::Channel => f.write_str("Channel"),
            Self::Member => f.write_str("Member"),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

impl BucketType {
    /// Key for the built-in selectors.
    pub fn key_for(&self, author_id: &str, channel_id: &str, server_id: Option<&str>) -> Result<String, CommandError> {
        match self {
            Self::Default => Ok(format!("{author_id}:{channel_id}")),
            Self::User => Ok(author_id.to_string()),
            Self::Server => server_id.map(str::to_string).ok_or(CommandError::ServerOnly),
            Self::Channel => Ok(channel_id.to_string()),
            Self::Member => server_id
                .map(|sid| format!("{author_id}:{sid}"))
                .ok_or(CommandError::ServerOnly),
            Self::Custom(_) => Err(CommandError::CheckFailed(
                "custom cooldown buckets need an invocation context".into(),
            )),
        }
    }

    pub fn resolve(&self, ctx: &Context) -> Result<String, CommandError> {
        match self {
            Self::Custom(f) => Ok(f(ctx)),
            _ => self.key_for(ctx.author_id(), ctx.channel_id(), ctx.server_id()),
        }
    }
}

/// Token bucket for a single key.
#[derive(Debug, Clone)]
pub struct Cooldown {
    rate: u32,
    per: Duration,
    window: Option<Instant>,
    tokens: u32,
    last: Instant,
}

impl Cooldown {
    pub fn new(rate: u32, per: Duration, now: Instant) -> Self {
        Self {
            rate,
            per,
            window: None,
            tokens: rate,
            last: now,
        }
    }

    /// Tokens available at `now`, counting a refill once the window elapsed.
    pub fn tokens_at(&self, now: Instant) -> u32 {
        match self.window {
            Some(window) if now <= window + self.per => self.tokens,
            _ => self.rate,
        }
    }

    /// Record an attempt at `now`. Returns the time left when rejected.
    pub fn update_at(&mut self, now: Instant) -> Option<Duration> {
        self.last = now;

        let expired = self.window.is_none_or(|window| now > window + self.per);
        if expired {
            self.tokens = self.rate;
            self.window = Some(now);
        }

        if self.tokens == 0 {
            let window = self.window.unwrap_or(now);
            return Some(self.per.saturating_sub(now.saturating_duration_since(window)));
        }

        self.tokens -= 1;
        if self.tokens == 0 {
            self.window = Some(now);
        }
        None
    }

    fn is_stale(&self, now: Instant) -> bool {
        now >= self.last + self.per
    }
}

/// All cooldowns of one command, keyed by bucket.
pub struct CooldownMapping {
    rate: u32,
    per: Duration,
    bucket: BucketType,
    cooldowns: Mutex<HashMap<String, Cooldown>>,
}

impl CooldownMapping {
    pub fn new(rate: u32, per: Duration, bucket: BucketType) -> Self {
        Self {
            rate,
            per,
            bucket,
            cooldowns: Mutex::new(HashMap::new()),
        }
    }

    pub fn bucket(&self) -> &BucketType {
        &self.bucket
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn per(&self) -> Duration {
        self.per
    }

    /// Record an attempt for `key` at `now`, pruning stale keys first.
    pub fn update_at(&self, key: &str, now: Instant) -> Result<(), Duration> {
        let mut cooldowns = self.cooldowns.lock().unwrap_or_else(PoisonError::into_inner);
        cooldowns.retain(|_, c| !c.is_stale(now));

        let cooldown = cooldowns
            .entry(key.to_string())
            .or_insert_with(|| Cooldown::new(self.rate, self.per, now));
        match cooldown.update_at(now) {
            Some(retry_after) => Err(retry_after),
            None => Ok(()),
        }
    }

    /// Gate an invocation: resolve its key and spend a token.
    pub fn check(&self, ctx: &Context) -> Result<(), CommandError> {
        let key = self.bucket.resolve(ctx)?;
        self.update_at(&key, Instant::now())
            .map_err(|retry_after| CommandError::OnCooldown { retry_after })
    }

    /// Forget the cooldown of a key.
    pub fn reset(&self, key: &str) {
        self.cooldowns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    pub fn len(&self) -> usize {
        self.cooldowns.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for CooldownMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CooldownMapping")
            .field("rate", &self.rate)
            .field("per", &self.per)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}
