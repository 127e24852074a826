//! 合约代码映射
//!
//! 平台合约代码 <-> 米筐合约代码（order_book_id）的双向转换。
//! 各交易所的命名规则不同：
//! - 中金所：大写品种 + 四位年月，期权带连字符（IO2406-C-3500）
//! - 上期所、能源中心：小写品种 + 四位年月，期权无连字符（cu2409C72000）
//! - 大商所：小写品种 + 四位年月，期权带连字符（m2409-C-3000）
//! - 郑商所：大写品种 + 三位年月（年份只有一位），米筐使用四位年月
//! - 金交所：挂牌合约名去掉括号和加号，加 `.SGEX` 后缀
//! - 上交所、深交所：股票基金加 `.XSHG` / `.XSHE` 后缀，股票期权使用8位数字代码
//!
//! 映射是纯函数，不访问网络。

use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

use crate::error::{DatafeedError, Result};
use crate::models::{Exchange, InstrumentRef};

use super::common::{
    is_etf_code, is_numeric_code, sge_compact, CONTINUOUS_SUFFIXES, SGE_INSTRUMENTS,
};
use super::vendor::VendorListing;

/// 品种类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    /// 期货合约
    Future,
    /// 期货期权
    FutureOption,
    /// 连续合约、指数合约（如 rb88、rb99）
    Continuous,
    /// 主力连续（只有品种代码，如 rb）
    Dominant,
    /// 黄金现货
    Spot,
    /// 股票
    Equity,
    /// ETF 基金
    Fund,
    /// 股票期权、ETF期权
    EquityOption,
}

impl AssetClass {
    pub fn is_synthetic(&self) -> bool {
        matches!(self, AssetClass::Continuous | AssetClass::Dominant)
    }
}

/// 米筐合约代码
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct VendorCode(String);

impl VendorCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VendorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<VendorCode> for String {
    fn from(code: VendorCode) -> Self {
        code.0
    }
}

/// 解析后的合约
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInstrument {
    pub code: VendorCode,
    pub asset_class: AssetClass,
}

/// 米筐合约全集
///
/// 会话初始化时从 all_instruments 加载，用于郑商所年份推断和合约存在性检查
#[derive(Debug, Clone, Default)]
pub struct InstrumentUniverse {
    codes: HashSet<String>,
    listings: Vec<VendorListing>,
}

impl InstrumentUniverse {
    pub fn new(listings: Vec<VendorListing>) -> Self {
        let codes = listings.iter().map(|l| l.order_book_id.clone()).collect();
        Self { codes, listings }
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn listings(&self) -> &[VendorListing] {
        &self.listings
    }
}

/// 期货交易所的代码规则
#[derive(Debug, Clone, Copy)]
struct FuturesRule {
    /// 品种代码小写
    lowercase_product: bool,
    /// 期权代码使用连字符分隔
    dashed_options: bool,
    /// 年月只保留年份个位（郑商所）
    single_digit_year: bool,
}

impl FuturesRule {
    fn month_digits(&self) -> usize {
        if self.single_digit_year {
            3
        } else {
            4
        }
    }

    fn product_matches(&self, product: &str) -> bool {
        if self.lowercase_product {
            product.chars().all(|c| c.is_ascii_lowercase())
        } else {
            product.chars().all(|c| c.is_ascii_uppercase())
        }
    }

    fn cased_product(&self, product: &str) -> String {
        if self.lowercase_product {
            product.to_lowercase()
        } else {
            product.to_uppercase()
        }
    }
}

/// 交易所代码规则，每个支持的交易所一个分支
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VenueRule {
    Cffex,
    Shfe,
    Dce,
    Czce,
    Ine,
    Sge,
    Sse,
    Szse,
}

impl VenueRule {
    fn for_exchange(exchange: Exchange) -> Result<Self> {
        match exchange {
            Exchange::Cffex => Ok(VenueRule::Cffex),
            Exchange::Shfe => Ok(VenueRule::Shfe),
            Exchange::Dce => Ok(VenueRule::Dce),
            Exchange::Czce => Ok(VenueRule::Czce),
            Exchange::Ine => Ok(VenueRule::Ine),
            Exchange::Sge => Ok(VenueRule::Sge),
            Exchange::Sse => Ok(VenueRule::Sse),
            Exchange::Szse => Ok(VenueRule::Szse),
            Exchange::Gfex | Exchange::Bse | Exchange::Hkfe | Exchange::Smart => Err(
                DatafeedError::UnsupportedInstrument(format!("不支持的交易所: {}", exchange)),
            ),
        }
    }

    fn futures_rule(self) -> Option<FuturesRule> {
        let rule = match self {
            VenueRule::Cffex => FuturesRule {
                lowercase_product: false,
                dashed_options: true,
                single_digit_year: false,
            },
            VenueRule::Shfe | VenueRule::Ine => FuturesRule {
                lowercase_product: true,
                dashed_options: false,
                single_digit_year: false,
            },
            VenueRule::Dce => FuturesRule {
                lowercase_product: true,
                dashed_options: true,
                single_digit_year: false,
            },
            VenueRule::Czce => FuturesRule {
                lowercase_product: false,
                dashed_options: false,
                single_digit_year: true,
            },
            VenueRule::Sge | VenueRule::Sse | VenueRule::Szse => return None,
        };
        Some(rule)
    }

    /// 证券交易所的米筐后缀
    fn security_suffix(self) -> Option<&'static str> {
        match self {
            VenueRule::Sse => Some("XSHG"),
            VenueRule::Szse => Some("XSHE"),
            _ => None,
        }
    }
}

/// 期权尾部：年月、可选连字符、C/P、可选连字符、行权价
fn option_tail_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{3,4})(-?)([CP])(-?)(\d+(?:\.\d+)?)$").expect("期权代码正则")
    })
}

/// 期货/期货期权代码的结构化表示
#[derive(Debug, Clone, PartialEq, Eq)]
enum FuturesSymbol {
    Dominant {
        product: String,
    },
    Continuous {
        product: String,
        suffix: String,
    },
    Contract {
        product: String,
        month: String,
    },
    Option {
        product: String,
        month: String,
        right: String,
        strike: String,
    },
}

impl FuturesSymbol {
    /// 按平台代码规则解析
    fn parse_generic(symbol: &str, rule: FuturesRule) -> Option<Self> {
        let (product, rest) = split_product(symbol)?;
        if !rule.product_matches(product) {
            return None;
        }
        let product = product.to_string();

        if rest.is_empty() {
            return Some(FuturesSymbol::Dominant { product });
        }
        if CONTINUOUS_SUFFIXES.contains(&rest) {
            return Some(FuturesSymbol::Continuous {
                product,
                suffix: rest.to_string(),
            });
        }
        if is_numeric_code(rest) {
            return (rest.len() == rule.month_digits()).then(|| FuturesSymbol::Contract {
                product,
                month: rest.to_string(),
            });
        }

        let caps = option_tail_regex().captures(rest)?;
        let month = &caps[1];
        let dashes = !caps[2].is_empty() && !caps[4].is_empty();
        let no_dashes = caps[2].is_empty() && caps[4].is_empty();
        let style_ok = if rule.dashed_options { dashes } else { no_dashes };
        if month.len() != rule.month_digits() || !style_ok {
            return None;
        }
        Some(FuturesSymbol::Option {
            product,
            month: month.to_string(),
            right: caps[3].to_string(),
            strike: caps[5].to_string(),
        })
    }

    /// 按米筐代码规则解析
    fn parse_vendor(code: &str, rule: FuturesRule) -> Option<Self> {
        let (product, rest) = split_product(code)?;
        if !product.chars().all(|c| c.is_ascii_uppercase()) {
            return None;
        }
        let product = rule.cased_product(product);

        if rest.is_empty() {
            return Some(FuturesSymbol::Dominant { product });
        }
        if CONTINUOUS_SUFFIXES.contains(&rest) {
            return Some(FuturesSymbol::Continuous {
                product,
                suffix: rest.to_string(),
            });
        }

        let strip_decade = |month: &str| -> String {
            if rule.single_digit_year {
                month[1..].to_string()
            } else {
                month.to_string()
            }
        };

        if is_numeric_code(rest) {
            return (rest.len() == 4).then(|| FuturesSymbol::Contract {
                product,
                month: strip_decade(rest),
            });
        }

        let caps = option_tail_regex().captures(rest)?;
        if caps[1].len() != 4 || !caps[2].is_empty() || !caps[4].is_empty() {
            return None;
        }
        Some(FuturesSymbol::Option {
            product,
            month: strip_decade(&caps[1]),
            right: caps[3].to_string(),
            strike: caps[5].to_string(),
        })
    }

    fn asset_class(&self) -> AssetClass {
        match self {
            FuturesSymbol::Dominant { .. } => AssetClass::Dominant,
            FuturesSymbol::Continuous { .. } => AssetClass::Continuous,
            FuturesSymbol::Contract { .. } => AssetClass::Future,
            FuturesSymbol::Option { .. } => AssetClass::FutureOption,
        }
    }

    fn to_vendor(&self, rule: FuturesRule, universe: Option<&InstrumentUniverse>) -> String {
        match self {
            FuturesSymbol::Dominant { product } => product.to_uppercase(),
            FuturesSymbol::Continuous { product, suffix } => {
                format!("{}{}", product.to_uppercase(), suffix)
            }
            FuturesSymbol::Contract { product, month } => {
                let product = product.to_uppercase();
                if rule.single_digit_year {
                    resolve_decade(&product, month, "", universe)
                } else {
                    format!("{}{}", product, month)
                }
            }
            FuturesSymbol::Option {
                product,
                month,
                right,
                strike,
            } => {
                let product = product.to_uppercase();
                let tail = format!("{}{}", right, strike);
                if rule.single_digit_year {
                    resolve_decade(&product, month, &tail, universe)
                } else {
                    format!("{}{}{}", product, month, tail)
                }
            }
        }
    }

    fn to_generic(&self, rule: FuturesRule) -> String {
        match self {
            FuturesSymbol::Dominant { product } => product.clone(),
            FuturesSymbol::Continuous { product, suffix } => format!("{}{}", product, suffix),
            FuturesSymbol::Contract { product, month } => format!("{}{}", product, month),
            FuturesSymbol::Option {
                product,
                month,
                right,
                strike,
            } => {
                if rule.dashed_options {
                    format!("{}{}-{}-{}", product, month, right, strike)
                } else {
                    format!("{}{}{}{}", product, month, right, strike)
                }
            }
        }
    }
}

/// 拆分出开头的字母部分（品种代码）
fn split_product(symbol: &str) -> Option<(&str, &str)> {
    let count = symbol
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .count();
    if count == 0 {
        return None;
    }
    Some(symbol.split_at(count))
}

/// 郑商所合约补全年份十位，优先使用 202x 年的合约
fn resolve_decade(
    product: &str,
    month: &str,
    tail: &str,
    universe: Option<&InstrumentUniverse>,
) -> String {
    let guess_2 = format!("{}2{}{}", product, month, tail);
    let guess_1 = format!("{}1{}{}", product, month, tail);

    match universe {
        Some(u) if !u.contains(&guess_2) && u.contains(&guess_1) => guess_1,
        _ => guess_2,
    }
}

/// 合约代码映射器
///
/// 可选地携带会话加载的合约全集，用于郑商所年份推断
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolMapper<'a> {
    universe: Option<&'a InstrumentUniverse>,
}

impl<'a> SymbolMapper<'a> {
    pub fn new() -> Self {
        Self { universe: None }
    }

    pub fn with_universe(universe: &'a InstrumentUniverse) -> Self {
        Self {
            universe: Some(universe),
        }
    }

    /// 平台代码 -> 米筐代码和品种类别
    pub fn resolve(&self, instrument: &InstrumentRef) -> Result<ResolvedInstrument> {
        let unsupported =
            || DatafeedError::UnsupportedInstrument(instrument.vt_symbol());
        let symbol = instrument.symbol.as_str();
        let rule = VenueRule::for_exchange(instrument.exchange)?;

        if symbol.is_empty() {
            return Err(unsupported());
        }

        if let Some(futures_rule) = rule.futures_rule() {
            let parsed =
                FuturesSymbol::parse_generic(symbol, futures_rule).ok_or_else(unsupported)?;
            return Ok(ResolvedInstrument {
                code: VendorCode(parsed.to_vendor(futures_rule, self.universe)),
                asset_class: parsed.asset_class(),
            });
        }

        if let Some(suffix) = rule.security_suffix() {
            if !is_numeric_code(symbol) {
                return Err(unsupported());
            }
            return match symbol.len() {
                6 => Ok(ResolvedInstrument {
                    code: VendorCode(format!("{}.{}", symbol, suffix)),
                    asset_class: if is_etf_code(symbol) {
                        AssetClass::Fund
                    } else {
                        AssetClass::Equity
                    },
                }),
                // 股票期权不添加交易所后缀
                8 => Ok(ResolvedInstrument {
                    code: VendorCode(symbol.to_string()),
                    asset_class: AssetClass::EquityOption,
                }),
                _ => Err(unsupported()),
            };
        }

        // 金交所
        if !SGE_INSTRUMENTS.contains(&symbol) {
            return Err(unsupported());
        }
        Ok(ResolvedInstrument {
            code: VendorCode(format!("{}.SGEX", sge_compact(symbol))),
            asset_class: AssetClass::Spot,
        })
    }

    /// 平台代码 -> 米筐代码
    pub fn map_to_vendor(&self, instrument: &InstrumentRef) -> Result<VendorCode> {
        self.resolve(instrument).map(|r| r.code)
    }

    /// 米筐代码 -> 平台代码
    ///
    /// 期货代码本身不带交易所信息，需要调用方给出交易所
    pub fn map_from_vendor(&self, code: &str, exchange_hint: Exchange) -> Result<InstrumentRef> {
        let unsupported = || {
            DatafeedError::UnsupportedInstrument(format!("{} ({})", code, exchange_hint))
        };
        let rule = VenueRule::for_exchange(exchange_hint)?;

        if let Some(futures_rule) = rule.futures_rule() {
            let parsed = FuturesSymbol::parse_vendor(code, futures_rule).ok_or_else(unsupported)?;
            return Ok(InstrumentRef::new(
                parsed.to_generic(futures_rule),
                exchange_hint,
            ));
        }

        if let Some(suffix) = rule.security_suffix() {
            let symbol = match code.split_once('.') {
                Some((body, s)) if s == suffix && body.len() == 6 => body,
                Some(_) => return Err(unsupported()),
                None if code.len() == 8 => code,
                None => return Err(unsupported()),
            };
            if !is_numeric_code(symbol) {
                return Err(unsupported());
            }
            return Ok(InstrumentRef::new(symbol, exchange_hint));
        }

        let body = code.strip_suffix(".SGEX").ok_or_else(unsupported)?;
        SGE_INSTRUMENTS
            .iter()
            .find(|s| sge_compact(s) == body)
            .map(|s| InstrumentRef::new(*s, exchange_hint))
            .ok_or_else(unsupported)
    }
}
