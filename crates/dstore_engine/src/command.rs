//! Write commands and queued transactions.

use std::time::Duration;

/// A single mutating command understood by every engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Sets a string value, optionally expiring after `ttl`.
    Set {
        /// Target key.
        key: String,
        /// New value.
        value: Vec<u8>,
        /// Time to live, `None` for a persistent key.
        ttl: Option<Duration>,
    },
    /// Deletes a key of any type.
    Del {
        /// Target key.
        key: String,
    },
    /// Sets one field of a hash.
    HSet {
        /// Hash key.
        key: String,
        /// Field name.
        field: String,
        /// Field value.
        value: Vec<u8>,
    },
    /// Removes fields from a hash.
    HDel {
        /// Hash key.
        key: String,
        /// Fields to remove.
        fields: Vec<String>,
    },
    /// Adds members to a set.
    SAdd {
        /// Set key.
        key: String,
        /// Members to add.
        members: Vec<String>,
    },
    /// Removes members from a set.
    SRem {
        /// Set key.
        key: String,
        /// Members to remove.
        members: Vec<String>,
    },
    /// Adds (or re-scores) members of a sorted set.
    ZAdd {
        /// Sorted set key.
        key: String,
        /// `(member, score)` pairs.
        members: Vec<(String, f64)>,
    },
    /// Removes members from a sorted set.
    ZRem {
        /// Sorted set key.
        key: String,
        /// Members to remove.
        members: Vec<String>,
    },
}

impl Command {
    /// Returns the key this command writes to.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Command::Set { key, .. }
            | Command::Del { key }
            | Command::HSet { key, .. }
            | Command::HDel { key, .. }
            | Command::SAdd { key, .. }
            | Command::SRem { key, .. }
            | Command::ZAdd { key, .. }
            | Command::ZRem { key, .. } => key,
        }
    }
}

/// Commands queued for atomic execution (`MULTI` ... `EXEC`).
///
/// Nothing is sent to the engine until the transaction is handed to
/// [`crate::KeyValueEngine::exec`]. If any key watched by the session changed
/// in the meantime, the engine discards the whole queue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    commands: Vec<Command>,
}

impl Transaction {
    /// Creates an empty transaction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an arbitrary command.
    pub fn push(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    /// Queues `SET key value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.push(Command::Set {
            key: key.into(),
            value: value.into(),
            ttl: None,
        })
    }

    /// Queues `SETEX key ttl value`.
    pub fn setex(
        &mut self,
        key: impl Into<String>,
        ttl: Duration,
        value: impl Into<Vec<u8>>,
    ) -> &mut Self {
        self.push(Command::Set {
            key: key.into(),
            value: value.into(),
            ttl: Some(ttl),
        })
    }

    /// Queues `DEL key`.
    pub fn del(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(Command::Del { key: key.into() })
    }

    /// Queues `HSET key field value`.
    pub fn hset(
        &mut self,
        key: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<Vec<u8>>,
    ) -> &mut Self {
        self.push(Command::HSet {
            key: key.into(),
            field: field.into(),
            value: value.into(),
        })
    }

    /// Queues `HDEL key field...`. Empty field lists are dropped.
    pub fn hdel(&mut self, key: impl Into<String>, fields: Vec<String>) -> &mut Self {
        if fields.is_empty() {
            return self;
        }
        self.push(Command::HDel {
            key: key.into(),
            fields,
        })
    }

    /// Queues `SADD key member...`. Empty member lists are dropped.
    pub fn sadd(&mut self, key: impl Into<String>, members: Vec<String>) -> &mut Self {
        if members.is_empty() {
            return self;
        }
        self.push(Command::SAdd {
            key: key.into(),
            members,
        })
    }

    /// Queues `SREM key member...`. Empty member lists are dropped.
    pub fn srem(&mut self, key: impl Into<String>, members: Vec<String>) -> &mut Self {
        if members.is_empty() {
            return self;
        }
        self.push(Command::SRem {
            key: key.into(),
            members,
        })
    }

    /// Queues `ZADD key score member...`. Empty member lists are dropped.
    pub fn zadd(&mut self, key: impl Into<String>, members: Vec<(String, f64)>) -> &mut Self {
        if members.is_empty() {
            return self;
        }
        self.push(Command::ZAdd {
            key: key.into(),
            members,
        })
    }

    /// Queues `ZREM key member...`. Empty member lists are dropped.
    pub fn zrem(&mut self, key: impl Into<String>, members: Vec<String>) -> &mut Self {
        if members.is_empty() {
            return self;
        }
        self.push(Command::ZRem {
            key: key.into(),
            members,
        })
    }

    /// Returns the queued commands in order.
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Returns the number of queued commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Consumes the transaction, returning its commands.
    #[must_use]
    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}
