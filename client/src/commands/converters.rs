use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;

use super::context::Context;
use super::errors::ConversionFailure;
use crate::model::{Category, Channel, Member, Role, User};

/// A converted command argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// An optional parameter that was not supplied.
    None,
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    User(Box<User>),
    Member(Box<Member>),
    Channel(Box<Channel>),
    Role(Box<Role>),
    Category(Box<Category>),
    /// Every value of a variadic parameter.
    List(Vec<Argument>),
}

impl Argument {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(n) => Some(*n),
            Self::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_user(&self) -> Option<&User> {
        match self {
            Self::User(u) => Some(u),
            Self::Member(m) => Some(&m.user),
            _ => None,
        }
    }

    pub fn as_member(&self) -> Option<&Member> {
        match self {
            Self::Member(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_channel(&self) -> Option<&Channel> {
        match self {
            Self::Channel(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_role(&self) -> Option<&Role> {
        match self {
            Self::Role(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_category(&self) -> Option<&Category> {
        match self {
            Self::Category(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_list(&self) -> &[Argument] {
        match self {
            Self::List(items) => items,
            _ => &[],
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Converted arguments of one invocation, in parameter order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: Vec<(String, Argument)>,
}

impl Arguments {
    pub(crate) fn push(&mut self, name: &str, value: Argument) {
        self.values.push((name.to_string(), value));
    }

    pub fn get(&self, name: &str) -> Option<&Argument> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Argument::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Argument::as_int)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Argument::as_bool)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Argument)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub type CustomConverter =
    Arc<dyn Fn(String, Context) -> BoxFuture<'static, Result<Argument, ConversionFailure>> + Send + Sync>;

/// Turns a raw token into an [`Argument`].
#[derive(Clone)]
pub enum Converter {
    String,
    Int,
    Float,
    Bool,
    /// Exact match against a fixed set of words.
    Literal(Vec<String>),
    User,
    Member,
    Channel,
    Role,
    Category,
    /// First converter that accepts the token wins.
    Union(Vec<Converter>),
    Custom(CustomConverter),
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("String"),
            Self::Int => f.write_str("Int"),
            Self::Float => f.write_str("Float"),
            Self::Bool => f.write_str("Bool"),
            Self::Literal(choices) => f.debug_tuple("Literal").field(choices).finish(),
            Self::User => f.write_str("User"),
            Self::Member => f.write_str("Member"),
            Self::Channel => f.write_str("Channel"),
            Self::Role => f.write_str("Role"),
            Self::Category => f.write_str("Category"),
            Self::Union(parts) => f.debug_tuple("Union").field(parts).finish(),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

impl Converter {
    pub fn literal<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Literal(choices.into_iter().map(Into::into).collect())
    }

    pub fn custom<F, Fut>(f: F) -> Self
    where
        F: Fn(String, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Argument, ConversionFailure>> + Send + 'static,
    {
        Self::Custom(Arc::new(move |arg, ctx| f(arg, ctx).boxed()))
    }

    /// Converters that only make sense inside a server.
    pub fn requires_server(&self) -> bool {
        matches!(self, Self::Member | Self::Channel | Self::Role | Self::Category)
    }

    pub fn convert<'a>(&'a self, arg: &'a str, ctx: &'a Context) -> BoxFuture<'a, Result<Argument, ConversionFailure>> {
        async move {
            match self {
                Self::String => Ok(Argument::String(arg.to_string())),
                Self::Int => arg.parse().map(Argument::Int).map_err(|_| ConversionFailure::Int),
                Self::Float => arg
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .map(Argument::Float)
                    .ok_or(ConversionFailure::Float),
                Self::Bool => parse_bool(arg).map(Argument::Bool).ok_or(ConversionFailure::Bool),
                Self::Literal(choices) => {
                    if choices.iter().any(|c| c == arg) {
                        Ok(Argument::String(arg.to_string()))
                    } else {
                        Err(ConversionFailure::Literal(choices.clone()))
                    }
                }
                Self::User => find_user(arg, ctx)
                    .map(|u| Argument::User(Box::new(u)))
                    .ok_or(ConversionFailure::User),
                Self::Member => find_member(arg, ctx)
                    .map(|m| Argument::Member(Box::new(m)))
                    .ok_or(ConversionFailure::Member),
                Self::Channel => find_channel(arg, ctx)
                    .map(|c| Argument::Channel(Box::new(c)))
                    .ok_or(ConversionFailure::Channel),
                Self::Role => find_role(arg, ctx)
                    .map(|r| Argument::Role(Box::new(r)))
                    .ok_or(ConversionFailure::Role),
                Self::Category => find_category(arg, ctx)
                    .map(|c| Argument::Category(Box::new(c)))
                    .ok_or(ConversionFailure::Category),
                Self::Union(parts) => {
                    let mut failures = Vec::with_capacity(parts.len());
                    for part in parts {
                        match part.convert(arg, ctx).await {
                            Ok(value) => return Ok(value),
                            Err(failure) => failures.push(failure),
                        }
                    }
                    Err(ConversionFailure::Union(failures))
                }
                Self::Custom(f) => f(arg.to_string(), ctx.clone()).await,
            }
        }
        .boxed()
    }
}

pub fn parse_bool(arg: &str) -> Option<bool> {
    match arg.to_lowercase().as_str() {
        "yes" | "true" | "y" | "1" | "on" | "enable" => Some(true),
        "no" | "false" | "n" | "0" | "off" | "disable" => Some(false),
        _ => None,
    }
}

/// Inner id of a `<{sigil}id>` mention, or the input unchanged.
fn strip_mention(arg: &str, sigil: char) -> &str {
    arg.strip_prefix('<')
        .and_then(|rest| rest.strip_prefix(sigil))
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(arg)
}

/// `name` or `name#discriminator`.
fn split_tag(arg: &str) -> Option<(&str, Option<&str>)> {
    let mut parts = arg.split('#');
    let name = parts.next()?;
    let discriminator = parts.next();
    if parts.next().is_some() {
        return None;
    }
    Some((name, discriminator))
}

fn user_matches(user: &User, name: &str, discriminator: Option<&str>) -> bool {
    let name_matches = user.username == name || user.display_name.as_deref() == Some(name);
    name_matches && discriminator.is_none_or(|d| user.discriminator == d)
}

fn find_user(arg: &str, ctx: &Context) -> Option<User> {
    let id = strip_mention(arg, '@');
    if let Some(user) = ctx.cache().get_user(id) {
        return Some(user);
    }
    let (name, discriminator) = split_tag(arg)?;
    ctx.cache().find_user(|u| user_matches(u, name, discriminator))
}

fn find_member(arg: &str, ctx: &Context) -> Option<Member> {
    let server = ctx.server()?;
    let id = strip_mention(arg, '@');
    if let Some(member) = server.get_member(id) {
        return Some(member.clone());
    }
    let (name, discriminator) = split_tag(arg)?;
    server
        .members()
        .find(|m| {
            user_matches(&m.user, name, discriminator)
                || (discriminator.is_none() && m.nickname.as_deref() == Some(name))
        })
        .cloned()
}

fn find_channel(arg: &str, ctx: &Context) -> Option<Channel> {
    let server_id = ctx.server_id()?;
    let id = strip_mention(arg, '#');
    let channels = ctx.cache().server_channels(server_id);
    channels
        .iter()
        .find(|c| c.id() == id)
        .or_else(|| channels.iter().find(|c| c.name() == Some(arg)))
        .cloned()
}

fn find_role(arg: &str, ctx: &Context) -> Option<Role> {
    let server = ctx.server()?;
    let id = strip_mention(arg, '%');
    if let Some(role) = server.get_role(id) {
        return Some(role.clone());
    }
    server.roles().into_iter().find(|r| r.name == arg).cloned()
}

fn find_category(arg: &str, ctx: &Context) -> Option<Category> {
    let server = ctx.server()?;
    server
        .get_category(arg)
        .or_else(|| server.categories.iter().find(|c| c.name == arg))
        .cloned()
}
