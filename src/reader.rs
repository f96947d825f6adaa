//! Product recognition and dispatch.
//!
//! A [Reader] holds an immutable table of [Rule]s, one per product
//! [Variant]. Every rule is tried on every path, so a misconfigured table
//! is reported as ambiguous instead of silently resolved by order.

use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fmt::Display, path::Path, str::FromStr, sync::Arc};

use crate::{
    components::archive::{product_name, ProductTree},
    config::Config,
    dem::DemProvider,
    errors::{Result, SensorioError},
    product::Product,
    sensors::{
        Context, Landsat, OpticalProduct, Radarsat2, SarProcessor, SarProduct, Sensor, Sentinel1,
        Sentinel2, Sentinel2Theia, TerraSarX,
    },
};

/// Product families the reader can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    Sentinel2,
    Sentinel2Theia,
    Landsat,
    Sentinel1,
    TerraSarX,
    Radarsat2,
}

impl Variant {
    pub const ALL: [Variant; 6] = [
        Variant::Sentinel2,
        Variant::Sentinel2Theia,
        Variant::Landsat,
        Variant::Sentinel1,
        Variant::TerraSarX,
        Variant::Radarsat2,
    ];

    pub fn name_pattern(&self) -> &'static str {
        match self {
            Variant::Sentinel2 => Sentinel2::NAME_PATTERN,
            Variant::Sentinel2Theia => Sentinel2Theia::NAME_PATTERN,
            Variant::Landsat => Landsat::NAME_PATTERN,
            Variant::Sentinel1 => Sentinel1::NAME_PATTERN,
            Variant::TerraSarX => TerraSarX::NAME_PATTERN,
            Variant::Radarsat2 => Radarsat2::NAME_PATTERN,
        }
    }

    pub fn metadata_pattern(&self) -> &'static str {
        match self {
            Variant::Sentinel2 => Sentinel2::METADATA_PATTERN,
            Variant::Sentinel2Theia => Sentinel2Theia::METADATA_PATTERN,
            Variant::Landsat => Landsat::METADATA_PATTERN,
            Variant::Sentinel1 => Sentinel1::METADATA_PATTERN,
            Variant::TerraSarX => TerraSarX::METADATA_PATTERN,
            Variant::Radarsat2 => Radarsat2::METADATA_PATTERN,
        }
    }

    /// Instantiates the product of this variant over `tree`.
    pub fn open(&self, tree: ProductTree, context: Context) -> Result<Box<dyn Product>> {
        let product: Box<dyn Product> = match self {
            Variant::Sentinel2 => Box::new(OpticalProduct::<Sentinel2>::open(tree, context)?),
            Variant::Sentinel2Theia => {
                Box::new(OpticalProduct::<Sentinel2Theia>::open(tree, context)?)
            }
            Variant::Landsat => Box::new(OpticalProduct::<Landsat>::open(tree, context)?),
            Variant::Sentinel1 => Box::new(SarProduct::<Sentinel1>::open(tree, context)?),
            Variant::TerraSarX => Box::new(SarProduct::<TerraSarX>::open(tree, context)?),
            Variant::Radarsat2 => Box::new(SarProduct::<Radarsat2>::open(tree, context)?),
        };
        Ok(product)
    }
}

impl Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// What recognition rules look at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckMethod {
    /// Metadata files inside the product.
    Metadata,
    /// Product name.
    Name,
    #[default]
    Both,
}

impl FromStr for CheckMethod {
    type Err = SensorioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metadata" => Ok(CheckMethod::Metadata),
            "name" => Ok(CheckMethod::Name),
            "both" => Ok(CheckMethod::Both),
            _ => Err(SensorioError::InvalidProduct(format!(
                "unknown check method {s:?}"
            ))),
        }
    }
}

/// Recognition rule of one variant.
#[derive(Debug, Clone)]
pub struct Rule {
    pub variant: Variant,
    name: Regex,
    metadata: Regex,
}

impl Rule {
    pub fn new(variant: Variant, name_pattern: &str, metadata_pattern: &str) -> Result<Self> {
        Ok(Self {
            variant,
            name: Regex::new(name_pattern)?,
            metadata: Regex::new(metadata_pattern)?,
        })
    }

    pub fn for_variant(variant: Variant) -> Result<Self> {
        Self::new(variant, variant.name_pattern(), variant.metadata_pattern())
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.name.is_match(name)
    }

    pub fn matches_metadata(&self, tree: &ProductTree) -> bool {
        tree.find(&self.metadata).is_some()
    }

    pub fn matches(&self, tree: &ProductTree, method: CheckMethod) -> bool {
        match method {
            CheckMethod::Name => self.matches_name(&tree.name()),
            CheckMethod::Metadata => self.matches_metadata(tree),
            CheckMethod::Both => self.matches_name(&tree.name()) && self.matches_metadata(tree),
        }
    }
}

/// Opens products, safe to build once and share.
#[derive(Debug, Clone)]
pub struct Reader {
    rules: Vec<Rule>,
    context: Context,
}

impl Reader {
    pub fn new() -> Result<Self> {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Result<Self> {
        let config = config.validated()?;
        let rules = Variant::ALL
            .into_iter()
            .map(Rule::for_variant)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            rules,
            context: Context::new(config),
        })
    }

    /// Replaces the rule table.
    pub fn with_rules(mut self, rules: Vec<Rule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_dem_provider(mut self, provider: Arc<dyn DemProvider>) -> Self {
        self.context.dem = Some(provider);
        self
    }

    pub fn with_sar_processor(mut self, processor: Arc<dyn SarProcessor>) -> Self {
        self.context.sar_processor = processor;
        self
    }

    pub fn config(&self) -> &Config {
        &self.context.config
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Variants whose rule claims `path`, in table order.
    pub fn recognize(&self, path: impl AsRef<Path>) -> Result<Vec<Variant>> {
        let tree = Self::tree(path.as_ref())?;
        Ok(self.claims(&tree))
    }

    /// Listing of `path`, which no rule can claim when it can not be listed.
    fn tree(path: &Path) -> Result<ProductTree> {
        ProductTree::open(path).map_err(|err| {
            debug!("{path:?} can not be listed: {err}");
            SensorioError::UnrecognizedProduct(path.to_path_buf())
        })
    }

    fn claims(&self, tree: &ProductTree) -> Vec<Variant> {
        let method = self.context.config.check_method;
        self.rules
            .iter()
            .filter(|rule| rule.matches(tree, method))
            .map(|rule| rule.variant)
            .collect()
    }

    pub fn open(&self, path: impl AsRef<Path>) -> Result<Box<dyn Product>> {
        let path = path.as_ref();
        let tree = Self::tree(path)?;
        let variants = self.claims(&tree);
        debug!("{path:?} is claimed by {variants:?}");
        match variants[..] {
            [] => Err(SensorioError::UnrecognizedProduct(path.to_path_buf())),
            [variant] => {
                info!("open {path:?} as {variant}");
                variant.open(tree, self.context.clone())
            }
            _ => Err(SensorioError::AmbiguousProduct {
                path: path.to_path_buf(),
                variants: variants.clone(),
            }),
        }
    }

    /// Whether the name of `path` alone matches the rule of `variant`.
    pub fn valid_name(&self, path: impl AsRef<Path>, variant: Variant) -> bool {
        let name = product_name(path.as_ref());
        self.rules
            .iter()
            .filter(|rule| rule.variant == variant)
            .any(|rule| rule.matches_name(&name))
    }
}
