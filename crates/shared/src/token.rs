use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{CategoryId, GroupId, ItemId, OrderId, RandomScope, RestaurantId};

/// Transport ceiling for a single button payload.
pub const MAX_TOKEN_BYTES: usize = 64;

const MENU_PREFIX: &str = "m";
const ORDER_PREFIX: &str = "o";
const STATS_PREFIX: &str = "stats";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token exceeds {MAX_TOKEN_BYTES} bytes")]
    Oversize,
    #[error("unknown token prefix")]
    UnknownPrefix,
    #[error("wrong number of token fields")]
    FieldCount,
    #[error("invalid token field '{0}'")]
    Field(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavAction {
    #[default]
    None,
    Random,
    Order,
}

impl NavAction {
    fn wire(self) -> &'static str {
        match self {
            NavAction::None => "_",
            NavAction::Random => "random",
            NavAction::Order => "order",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "_" => Some(NavAction::None),
            "random" => Some(NavAction::Random),
            "order" => Some(NavAction::Order),
            _ => None,
        }
    }
}

/// One position in the catalog traversal. Never persisted; round-trips
/// through the transport as an encoded token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavState {
    pub level: u8,
    pub restaurant: RestaurantId,
    pub group: GroupId,
    pub category: CategoryId,
    pub item: ItemId,
    pub action: NavAction,
}

impl NavState {
    pub fn root() -> Self {
        Self {
            level: 0,
            restaurant: RestaurantId(0),
            group: GroupId(0),
            category: CategoryId(0),
            item: ItemId(0),
            action: NavAction::None,
        }
    }

    pub fn in_restaurant(restaurant: RestaurantId) -> Self {
        Self {
            level: 1,
            restaurant,
            ..Self::root()
        }
    }

    pub fn in_group(restaurant: RestaurantId, group: GroupId) -> Self {
        Self {
            level: 2,
            restaurant,
            group,
            ..Self::root()
        }
    }

    pub fn in_category(restaurant: RestaurantId, group: GroupId, category: CategoryId) -> Self {
        Self {
            level: 3,
            restaurant,
            group,
            category,
            ..Self::root()
        }
    }

    pub fn for_item(
        restaurant: RestaurantId,
        group: GroupId,
        category: CategoryId,
        item: ItemId,
    ) -> Self {
        Self {
            level: 4,
            restaurant,
            group,
            category,
            item,
            ..Self::root()
        }
    }

    /// Level-4 random view; group and category may be zero when the scope
    /// is the whole restaurant or group.
    pub fn random_in(restaurant: RestaurantId, group: GroupId, category: CategoryId) -> Self {
        Self {
            level: 4,
            restaurant,
            group,
            category,
            action: NavAction::Random,
            ..Self::root()
        }
    }

    pub fn order_for(
        restaurant: RestaurantId,
        group: GroupId,
        category: CategoryId,
        item: ItemId,
    ) -> Self {
        Self {
            level: 5,
            restaurant,
            group,
            category,
            item,
            action: NavAction::Order,
        }
    }

    /// Deepest non-zero identifier bounding a random pick.
    pub fn random_scope(&self) -> RandomScope {
        if self.category.0 != 0 {
            RandomScope::Category(self.category)
        } else if self.group.0 != 0 {
            RandomScope::Group(self.group)
        } else if self.restaurant.0 != 0 {
            RandomScope::Restaurant(self.restaurant)
        } else {
            RandomScope::Any
        }
    }

    /// Structural check: the identifier chain must be a prefix, and the
    /// level strictly determines which fields are meaningful. A decoded
    /// state failing this is treated as tampered or stale.
    pub fn is_consistent(&self) -> bool {
        let chain_ok = (self.group.0 == 0 || self.restaurant.0 != 0)
            && (self.category.0 == 0 || self.group.0 != 0)
            && (self.item.0 == 0 || self.category.0 != 0);
        if !chain_ok {
            return false;
        }
        match self.level {
            0 => self.action == NavAction::None && self.restaurant.0 == 0,
            1 => self.action == NavAction::None && self.restaurant.0 != 0 && self.group.0 == 0,
            2 => self.action == NavAction::None && self.group.0 != 0 && self.category.0 == 0,
            3 => self.action == NavAction::None && self.category.0 != 0 && self.item.0 == 0,
            4 => match self.action {
                NavAction::Random => self.item.0 == 0 && self.restaurant.0 != 0,
                NavAction::None => self.item.0 != 0,
                NavAction::Order => false,
            },
            5 => self.action == NavAction::Order && self.item.0 != 0,
            _ => false,
        }
    }

    pub fn encode(&self) -> String {
        let mut parts = vec![
            self.level.to_string(),
            self.restaurant.0.to_string(),
            self.group.0.to_string(),
            self.category.0.to_string(),
            self.item.0.to_string(),
            self.action.wire().to_string(),
        ];
        while parts.len() > 1 {
            let last = parts.last().map(String::as_str);
            if last == Some("0") || last == Some("_") {
                parts.pop();
            } else {
                break;
            }
        }
        format!("{MENU_PREFIX}:{}", parts.join(":"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderToken {
    Delete { order_id: OrderId },
}

impl OrderToken {
    pub fn encode(&self) -> String {
        match self {
            OrderToken::Delete { order_id } => format!("{ORDER_PREFIX}:delete:{}", order_id.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsPeriod {
    Week,
    Month,
    All,
}

impl StatsPeriod {
    pub fn wire(self) -> &'static str {
        match self {
            StatsPeriod::Week => "week",
            StatsPeriod::Month => "month",
            StatsPeriod::All => "all",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "week" => Some(StatsPeriod::Week),
            "month" => Some(StatsPeriod::Month),
            "all" => Some(StatsPeriod::All),
            _ => None,
        }
    }

    /// Trailing window in days; `None` means all time.
    pub fn window_days(self) -> Option<i64> {
        match self {
            StatsPeriod::Week => Some(7),
            StatsPeriod::Month => Some(30),
            StatsPeriod::All => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsToken {
    /// Back to the period picker.
    Picker,
    View(StatsPeriod),
    Export(StatsPeriod),
}

impl StatsToken {
    pub fn encode(&self) -> String {
        match self {
            StatsToken::Picker => format!("{STATS_PREFIX}:back:view"),
            StatsToken::View(period) => format!("{STATS_PREFIX}:{}:view", period.wire()),
            StatsToken::Export(period) => format!("{STATS_PREFIX}:{}:excel", period.wire()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Menu(NavState),
    Order(OrderToken),
    Stats(StatsToken),
}

impl Token {
    pub fn encode(&self) -> String {
        match self {
            Token::Menu(state) => state.encode(),
            Token::Order(token) => token.encode(),
            Token::Stats(token) => token.encode(),
        }
    }

    /// Defensive parse: payloads come back from the client and may be
    /// replayed or tampered with, so anything this codec would not itself
    /// produce is rejected.
    pub fn decode(raw: &str) -> Result<Self, TokenError> {
        if raw.len() > MAX_TOKEN_BYTES {
            return Err(TokenError::Oversize);
        }
        let mut parts = raw.split(':');
        let prefix = parts.next().unwrap_or_default();
        let fields: Vec<&str> = parts.collect();
        match prefix {
            MENU_PREFIX => decode_menu(&fields),
            ORDER_PREFIX => decode_order(&fields),
            STATS_PREFIX => decode_stats(&fields),
            _ => Err(TokenError::UnknownPrefix),
        }
    }
}

fn decode_menu(fields: &[&str]) -> Result<Token, TokenError> {
    if fields.is_empty() || fields.len() > 6 {
        return Err(TokenError::FieldCount);
    }
    let level = parse_id(fields[0])?;
    if level > 5 {
        return Err(TokenError::Field(fields[0].to_string()));
    }
    let restaurant = fields.get(1).map(|raw| parse_id(raw)).transpose()?;
    let group = fields.get(2).map(|raw| parse_id(raw)).transpose()?;
    let category = fields.get(3).map(|raw| parse_id(raw)).transpose()?;
    let item = fields.get(4).map(|raw| parse_id(raw)).transpose()?;
    let action = fields
        .get(5)
        .map(|raw| NavAction::parse(raw).ok_or_else(|| TokenError::Field(raw.to_string())))
        .transpose()?;

    Ok(Token::Menu(NavState {
        level: level as u8,
        restaurant: RestaurantId(restaurant.unwrap_or(0)),
        group: GroupId(group.unwrap_or(0)),
        category: CategoryId(category.unwrap_or(0)),
        item: ItemId(item.unwrap_or(0)),
        action: action.unwrap_or_default(),
    }))
}

fn decode_order(fields: &[&str]) -> Result<Token, TokenError> {
    if fields.len() != 2 {
        return Err(TokenError::FieldCount);
    }
    if fields[0] != "delete" {
        return Err(TokenError::Field(fields[0].to_string()));
    }
    let order_id = parse_id(fields[1])?;
    Ok(Token::Order(OrderToken::Delete {
        order_id: OrderId(order_id),
    }))
}

fn decode_stats(fields: &[&str]) -> Result<Token, TokenError> {
    if fields.len() != 2 {
        return Err(TokenError::FieldCount);
    }
    if fields[0] == "back" {
        return if fields[1] == "view" {
            Ok(Token::Stats(StatsToken::Picker))
        } else {
            Err(TokenError::Field(fields[1].to_string()))
        };
    }
    let period =
        StatsPeriod::parse(fields[0]).ok_or_else(|| TokenError::Field(fields[0].to_string()))?;
    match fields[1] {
        "view" => Ok(Token::Stats(StatsToken::View(period))),
        "excel" => Ok(Token::Stats(StatsToken::Export(period))),
        other => Err(TokenError::Field(other.to_string())),
    }
}

fn parse_id(raw: &str) -> Result<i64, TokenError> {
    let value: i64 = raw
        .parse()
        .map_err(|_| TokenError::Field(raw.to_string()))?;
    if value < 0 {
        return Err(TokenError::Field(raw.to_string()));
    }
    Ok(value)
}
