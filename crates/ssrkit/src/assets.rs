// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Page assets: stylesheets, scripts and preloads of a page.
//!
//! An [`AssetResolver`] maps a page's dependency files to asset descriptors.
//! [`DevAssetResolver`] serves source files as-is; [`ManifestAssetResolver`]
//! reads a build manifest.

use crate::error::{Result, SsrError};
use crate::html::escape_html;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Kind of asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    /// Stylesheet.
    Style,
    /// Preloaded resource.
    Preload,
    /// Client entry script.
    Script,
}

/// `as` attribute of a preload link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PreloadType {
    /// `as="style"`.
    Style,
    /// `as="script"`.
    Script,
    /// `as="font"`.
    Font,
    /// `as="image"`.
    Image,
}

impl PreloadType {
    fn as_str(&self) -> &'static str {
        match self {
            PreloadType::Style => "style",
            PreloadType::Script => "script",
            PreloadType::Font => "font",
            PreloadType::Image => "image",
        }
    }
}

/// One asset of a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageAsset {
    /// URL of the asset.
    pub src: String,
    /// Kind of asset.
    pub asset_type: AssetType,
    /// MIME type, when known.
    pub media_type: Option<String>,
    /// Preload kind, for preloads.
    pub preload_type: Option<PreloadType>,
}

impl PageAsset {
    /// Stylesheet asset.
    pub fn style(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            asset_type: AssetType::Style,
            media_type: Some("text/css".to_string()),
            preload_type: None,
        }
    }

    /// Module script asset.
    pub fn script(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            asset_type: AssetType::Script,
            media_type: Some("text/javascript".to_string()),
            preload_type: None,
        }
    }

    /// Preload asset; media and preload types are inferred from the extension.
    pub fn preload(src: impl Into<String>) -> Self {
        let src = src.into();
        let (media_type, preload_type) = infer_types(&src);
        Self {
            src,
            asset_type: AssetType::Preload,
            media_type: media_type.map(str::to_string),
            preload_type: Some(preload_type),
        }
    }

    /// HTML tag loading this asset.
    pub fn to_tag(&self) -> String {
        let src = escape_html(&self.src);
        match self.asset_type {
            AssetType::Style => format!("<link rel=\"stylesheet\" type=\"text/css\" href=\"{}\">", src),
            AssetType::Script => format!("<script type=\"module\" src=\"{}\" async></script>", src),
            AssetType::Preload => {
                let mut tag = format!("<link rel=\"preload\" href=\"{}\"", src);
                if let Some(preload_type) = self.preload_type {
                    tag.push_str(&format!(" as=\"{}\"", preload_type.as_str()));
                    if preload_type == PreloadType::Font {
                        tag.push_str(" crossorigin");
                    }
                }
                if let Some(media_type) = &self.media_type {
                    tag.push_str(&format!(" type=\"{}\"", escape_html(media_type)));
                }
                tag.push('>');
                tag
            }
        }
    }
}

fn infer_types(src: &str) -> (Option<&'static str>, PreloadType) {
    let path = src.split(['?', '#']).next().unwrap_or(src);
    let ext = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "css" => (Some("text/css"), PreloadType::Style),
        "js" | "mjs" | "ts" | "tsx" | "jsx" => (Some("text/javascript"), PreloadType::Script),
        "woff2" => (Some("font/woff2"), PreloadType::Font),
        "woff" => (Some("font/woff"), PreloadType::Font),
        "ttf" => (Some("font/ttf"), PreloadType::Font),
        "png" => (Some("image/png"), PreloadType::Image),
        "jpg" | "jpeg" => (Some("image/jpeg"), PreloadType::Image),
        "svg" => (Some("image/svg+xml"), PreloadType::Image),
        "webp" => (Some("image/webp"), PreloadType::Image),
        _ => (None, PreloadType::Script),
    }
}

/// Sorts assets for delivery: styles, then preloads, then scripts.
pub fn sort_page_assets(assets: &mut [PageAsset]) {
    assets.sort_by_key(|asset| asset.asset_type);
}

/// Splits assets into tags for `<head>` and for the end of `<body>`.
pub fn asset_tags(assets: &[PageAsset]) -> (String, String) {
    let mut head = String::new();
    let mut body = String::new();
    for asset in assets {
        let target = if asset.asset_type == AssetType::Script { &mut body } else { &mut head };
        target.push_str(&asset.to_tag());
        target.push('\n');
    }
    (head, body)
}

/// Resolves the assets of a page from its dependency files.
#[async_trait]
pub trait AssetResolver: Send + Sync {
    /// Assets for a page with the given dependencies and client entry.
    async fn page_assets(
        &self,
        dependencies: &[String],
        client_entry: &str,
        is_pre_rendering: bool,
    ) -> Result<Vec<PageAsset>>;
}

/// Development resolver: dependencies are served from their source path.
///
/// Stylesheet dependencies become styles, the client entry becomes the
/// script. Other dependencies are loaded by the client entry itself.
#[derive(Debug, Clone, Default)]
pub struct DevAssetResolver {
    url_prefix: String,
}

impl DevAssetResolver {
    /// Resolver serving files under `url_prefix` (e.g. `/@fs`).
    pub fn new(url_prefix: impl Into<String>) -> Self {
        Self {
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, file_path: &str) -> String {
        format!("{}{}", self.url_prefix, file_path)
    }
}

#[async_trait]
impl AssetResolver for DevAssetResolver {
    async fn page_assets(
        &self,
        dependencies: &[String],
        client_entry: &str,
        _is_pre_rendering: bool,
    ) -> Result<Vec<PageAsset>> {
        let mut assets: Vec<PageAsset> = dependencies
            .iter()
            .filter(|dep| dep.ends_with(".css"))
            .map(|dep| PageAsset::style(self.url(dep)))
            .collect();
        assets.push(PageAsset::script(self.url(client_entry)));
        sort_page_assets(&mut assets);
        Ok(assets)
    }
}

/// Entry of a build manifest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManifestEntry {
    /// Output file.
    pub file: String,
    /// Stylesheets emitted for this entry.
    #[serde(default)]
    pub css: Vec<String>,
    /// Manifest keys of the entries this entry imports.
    #[serde(default)]
    pub imports: Vec<String>,
    /// Other emitted assets (fonts, images).
    #[serde(default)]
    pub assets: Vec<String>,
}

/// Production resolver reading a build manifest (`{ "<source>": ManifestEntry }`).
#[derive(Debug, Clone, Default)]
pub struct ManifestAssetResolver {
    entries: HashMap<String, ManifestEntry>,
    base_url: String,
}

impl ManifestAssetResolver {
    /// Parses a manifest. Output files are served under `base_url`.
    pub fn from_json(manifest: &str, base_url: &str) -> Result<Self> {
        let entries: HashMap<String, ManifestEntry> = serde_json::from_str(manifest)?;
        Ok(Self {
            entries,
            base_url: crate::url::normalize_base_url(base_url),
        })
    }

    fn lookup(&self, file_path: &str) -> Option<&ManifestEntry> {
        self.entries
            .get(file_path)
            .or_else(|| self.entries.get(file_path.trim_start_matches('/')))
    }

    fn url(&self, output: &str) -> String {
        format!("{}/{}", self.base_url, output.trim_start_matches('/'))
    }

    fn collect(&self, key: &str, seen: &mut BTreeSet<String>, assets: &mut Vec<PageAsset>, is_entry: bool) {
        if !seen.insert(key.to_string()) {
            return;
        }
        let Some(entry) = self.entries.get(key) else {
            return;
        };
        if !is_entry {
            assets.push(PageAsset::preload(self.url(&entry.file)));
        }
        for css in &entry.css {
            assets.push(PageAsset::style(self.url(css)));
        }
        for asset in &entry.assets {
            assets.push(PageAsset::preload(self.url(asset)));
        }
        for import in &entry.imports {
            self.collect(import, seen, assets, false);
        }
    }
}

#[async_trait]
impl AssetResolver for ManifestAssetResolver {
    async fn page_assets(
        &self,
        dependencies: &[String],
        client_entry: &str,
        _is_pre_rendering: bool,
    ) -> Result<Vec<PageAsset>> {
        let entry = self.lookup(client_entry).ok_or_else(|| {
            SsrError::usage(format!(
                "The client entry {} is missing in the build manifest. Did you build the client?",
                client_entry
            ))
        })?;
        let mut seen = BTreeSet::new();
        let mut assets = vec![PageAsset::script(self.url(&entry.file))];
        for dep in dependencies {
            let key = if self.entries.contains_key(dep.as_str()) {
                dep.clone()
            } else {
                dep.trim_start_matches('/').to_string()
            };
            self.collect(&key, &mut seen, &mut assets, key.trim_start_matches('/') == client_entry.trim_start_matches('/'));
        }
        let mut unique = BTreeSet::new();
        assets.retain(|asset| unique.insert((asset.src.clone(), asset.asset_type)));
        sort_page_assets(&mut assets);
        Ok(assets)
    }
}
