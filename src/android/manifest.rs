use crate::error::{BundleError, BundleResult};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::{BTreeMap, BTreeSet};

pub const ANDROID_NAMESPACE_URI: &str = "http://schemas.android.com/apk/res/android";
pub const DISTRIBUTION_NAMESPACE_URI: &str = "http://schemas.android.com/apk/distribution";

pub const APPLICATION_ELEMENT: &str = "application";
pub const ACTIVITY_ELEMENT: &str = "activity";
pub const META_DATA_ELEMENT: &str = "meta-data";
pub const INTENT_FILTER_ELEMENT: &str = "intent-filter";
pub const USES_SDK_ELEMENT: &str = "uses-sdk";

const NATIVE_ACTIVITY_CLASS: &str = "android.app.NativeActivity";
const NATIVE_ACTIVITY_LIB_NAME: &str = "android.app.lib_name";
const DEFAULT_NATIVE_ACTIVITY_LIB: &str = "main";

/// Typed attribute values inside the manifest DOM representation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ManifestValue {
    String(String),
    Boolean(bool),
    Integer(i64),
    Reference(u32),
}

impl ManifestValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ManifestValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ManifestValue::Boolean(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ManifestValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_reference_id(&self) -> Option<u32> {
        match self {
            ManifestValue::Reference(id) => Some(*id),
            _ => None,
        }
    }

    fn to_text(&self) -> String {
        match self {
            ManifestValue::String(text) => text.clone(),
            ManifestValue::Boolean(flag) => flag.to_string(),
            ManifestValue::Integer(num) => num.to_string(),
            ManifestValue::Reference(id) => format!("@0x{id:08x}"),
        }
    }

    fn parse(text: &str) -> ManifestValue {
        let trimmed = text.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            ManifestValue::Boolean(true)
        } else if trimmed.eq_ignore_ascii_case("false") {
            ManifestValue::Boolean(false)
        } else if let Some(hex) = trimmed
            .strip_prefix("@0x")
            .or_else(|| trimmed.strip_prefix("@0X"))
        {
            u32::from_str_radix(hex, 16)
                .map(ManifestValue::Reference)
                .unwrap_or_else(|_| ManifestValue::String(trimmed.to_string()))
        } else if let Ok(number) = trimmed.parse::<i64>() {
            ManifestValue::Integer(number)
        } else {
            ManifestValue::String(trimmed.to_string())
        }
    }
}

impl From<String> for ManifestValue {
    fn from(value: String) -> Self {
        ManifestValue::String(value)
    }
}

impl From<&str> for ManifestValue {
    fn from(value: &str) -> Self {
        ManifestValue::String(value.to_owned())
    }
}

impl From<bool> for ManifestValue {
    fn from(value: bool) -> Self {
        ManifestValue::Boolean(value)
    }
}

impl From<i64> for ManifestValue {
    fn from(value: i64) -> Self {
        ManifestValue::Integer(value)
    }
}

/// A single attribute attached to a manifest element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestAttribute {
    pub namespace_prefix: Option<String>,
    pub namespace_uri: Option<String>,
    pub name: String,
    pub value: ManifestValue,
}

impl ManifestAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<ManifestValue>) -> Self {
        ManifestAttribute {
            namespace_prefix: None,
            namespace_uri: None,
            name: name.into(),
            value: value.into(),
        }
    }

    /// Attribute in the `android:` namespace.
    pub fn android(name: impl Into<String>, value: impl Into<ManifestValue>) -> Self {
        ManifestAttribute {
            namespace_prefix: Some("android".to_string()),
            namespace_uri: Some(ANDROID_NAMESPACE_URI.to_string()),
            name: name.into(),
            value: value.into(),
        }
    }

    /// Attribute in the `dist:` namespace.
    pub fn distribution(name: impl Into<String>, value: impl Into<ManifestValue>) -> Self {
        ManifestAttribute {
            namespace_prefix: Some("dist".to_string()),
            namespace_uri: Some(DISTRIBUTION_NAMESPACE_URI.to_string()),
            name: name.into(),
            value: value.into(),
        }
    }
}

/// DOM-style element node of a manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestElement {
    pub namespace_prefix: Option<String>,
    pub namespace_uri: Option<String>,
    pub tag: String,
    pub attributes: Vec<ManifestAttribute>,
    pub children: Vec<ManifestElement>,
    pub text: Option<String>,
}

impl ManifestElement {
    pub fn new(tag: impl Into<String>) -> Self {
        ManifestElement {
            namespace_prefix: None,
            namespace_uri: None,
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            text: None,
        }
    }

    pub fn distribution(tag: impl Into<String>) -> Self {
        ManifestElement {
            namespace_prefix: Some("dist".to_string()),
            namespace_uri: Some(DISTRIBUTION_NAMESPACE_URI.to_string()),
            ..ManifestElement::new(tag)
        }
    }

    pub fn with_attribute(mut self, attribute: ManifestAttribute) -> Self {
        self.set_attribute(attribute);
        self
    }

    pub fn with_child(mut self, child: ManifestElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Looks up `name` or `prefix:name`.
    pub fn attribute_value(&self, name: &str) -> Option<&ManifestValue> {
        let (namespace, local) = split_attribute_query(name);
        self.attributes
            .iter()
            .find(|attr| attr.name == local && attr.namespace_prefix.as_deref() == namespace)
            .map(|attr| &attr.value)
    }

    /// Value of `android:name` when it is a plain string.
    pub fn android_name(&self) -> Option<&str> {
        self.attribute_value("android:name").and_then(ManifestValue::as_str)
    }

    pub fn set_attribute(&mut self, attribute: ManifestAttribute) {
        if let Some(existing) = self.attributes.iter_mut().find(|attr| {
            attr.name == attribute.name && attr.namespace_prefix == attribute.namespace_prefix
        }) {
            *existing = attribute;
        } else {
            self.attributes.push(attribute);
        }
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<ManifestAttribute> {
        let (namespace, local) = split_attribute_query(name);
        let idx = self
            .attributes
            .iter()
            .position(|attr| attr.name == local && attr.namespace_prefix.as_deref() == namespace)?;
        Some(self.attributes.remove(idx))
    }

    pub fn append_child(&mut self, child: ManifestElement) {
        self.children.push(child);
    }

    pub fn find_child(&self, tag: &str) -> Option<&ManifestElement> {
        self.children.iter().find(|child| child.tag == tag)
    }

    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a ManifestElement> {
        self.children.iter().filter(move |child| child.tag == tag)
    }

    /// Returns the first child with the given tag, appending an empty one if missing.
    pub fn child_or_insert(&mut self, tag: &str) -> &mut ManifestElement {
        let idx = match self.children.iter().position(|child| child.tag == tag) {
            Some(idx) => idx,
            None => {
                self.children.push(ManifestElement::new(tag));
                self.children.len() - 1
            }
        };
        &mut self.children[idx]
    }
}

fn split_attribute_query(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((ns, local)) => (Some(ns), local),
        None => (None, name),
    }
}

fn qualified_name(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}:{local}"),
        None => local.to_string(),
    }
}

fn collect_namespaces(element: &ManifestElement, namespaces: &mut BTreeMap<String, String>) {
    if let (Some(prefix), Some(uri)) = (&element.namespace_prefix, &element.namespace_uri) {
        namespaces.insert(prefix.clone(), uri.clone());
    }
    for attr in &element.attributes {
        if let (Some(prefix), Some(uri)) = (&attr.namespace_prefix, &attr.namespace_uri) {
            namespaces.insert(prefix.clone(), uri.clone());
        }
    }
    for child in &element.children {
        collect_namespaces(child, namespaces);
    }
}

fn lookup_namespace_uri(stack: &[BTreeMap<String, String>], prefix: Option<&str>) -> Option<String> {
    let key = prefix.unwrap_or("");
    stack.iter().rev().find_map(|frame| frame.get(key).cloned())
}

fn split_qname_owned(name: &str) -> (Option<String>, String) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, name.to_string()),
    }
}

fn read_start(
    start: &BytesStart<'_>,
    ns_stack: &mut Vec<BTreeMap<String, String>>,
) -> BundleResult<ManifestElement> {
    let mut declared = BTreeMap::new();
    let mut pending = Vec::new();
    for attr in start.attributes().with_checks(false) {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|err| BundleError::Xml(err.to_string()))?
            .to_string();
        let value = attr.unescape_value()?.into_owned();
        if key == "xmlns" {
            declared.insert(String::new(), value);
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declared.insert(prefix.to_string(), value);
        } else {
            pending.push((key, value));
        }
    }
    ns_stack.push(declared);

    let raw_name = std::str::from_utf8(start.name().as_ref())
        .map_err(|err| BundleError::Xml(err.to_string()))?
        .to_string();
    let (prefix, local) = split_qname_owned(&raw_name);
    let mut element = ManifestElement::new(local);
    element.namespace_uri = lookup_namespace_uri(ns_stack, prefix.as_deref());
    element.namespace_prefix = prefix;
    for (key, value) in pending {
        let (prefix, name) = split_qname_owned(&key);
        element.attributes.push(ManifestAttribute {
            namespace_uri: prefix
                .as_deref()
                .and_then(|prefix| lookup_namespace_uri(ns_stack, Some(prefix))),
            namespace_prefix: prefix,
            name,
            value: ManifestValue::parse(&value),
        });
    }
    Ok(element)
}

fn attach(
    stack: &mut Vec<ManifestElement>,
    root: &mut Option<ManifestElement>,
    element: ManifestElement,
) -> BundleResult<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_none() {
        *root = Some(element);
    } else {
        return Err(BundleError::Xml("Multiple root elements in manifest".to_string()));
    }
    Ok(())
}

fn write_element(
    element: &ManifestElement,
    writer: &mut Writer<Vec<u8>>,
    namespaces: &BTreeMap<String, String>,
    is_root: bool,
) -> BundleResult<()> {
    let element_name = qualified_name(element.namespace_prefix.as_deref(), &element.tag);
    let mut attrs = Vec::new();
    if is_root {
        for (prefix, uri) in namespaces {
            attrs.push((format!("xmlns:{prefix}"), uri.clone()));
        }
    }
    for attr in &element.attributes {
        attrs.push((
            qualified_name(attr.namespace_prefix.as_deref(), &attr.name),
            attr.value.to_text(),
        ));
    }
    let mut start = BytesStart::new(element_name.as_str());
    for (key, value) in &attrs {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    if element.children.is_empty() && element.text.is_none() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }
    writer.write_event(Event::Start(start))?;
    if let Some(text) = &element.text {
        writer.write_event(Event::Text(BytesText::new(text)))?;
    }
    for child in &element.children {
        write_element(child, writer, namespaces, false)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element_name.as_str())))?;
    Ok(())
}

/// High-level representation of `AndroidManifest.xml`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AndroidManifest {
    root: ManifestElement,
}

impl Default for AndroidManifest {
    fn default() -> Self {
        AndroidManifest::new()
    }
}

impl AndroidManifest {
    pub fn new() -> Self {
        AndroidManifest {
            root: ManifestElement::new("manifest"),
        }
    }

    pub fn from_root(root: ManifestElement) -> Self {
        AndroidManifest { root }
    }

    /// Minimal manifest with a package name, handy for synthesized modules.
    pub fn for_package(package: impl Into<String>) -> Self {
        let mut manifest = AndroidManifest::new();
        manifest.set_package_name(package);
        manifest
    }

    pub fn root(&self) -> &ManifestElement {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut ManifestElement {
        &mut self.root
    }

    pub fn package_name(&self) -> Option<&str> {
        self.root.attribute_value("package").and_then(ManifestValue::as_str)
    }

    pub fn set_package_name(&mut self, package: impl Into<String>) {
        self.root
            .set_attribute(ManifestAttribute::new("package", package.into()));
    }

    pub fn application(&self) -> Option<&ManifestElement> {
        self.root.find_child(APPLICATION_ELEMENT)
    }

    pub fn application_mut(&mut self) -> &mut ManifestElement {
        self.root.child_or_insert(APPLICATION_ELEMENT)
    }

    fn uses_sdk_value(&self, attribute: &str) -> Option<u32> {
        self.root
            .find_child(USES_SDK_ELEMENT)?
            .attribute_value(attribute)?
            .as_integer()
            .and_then(|value| u32::try_from(value).ok())
    }

    pub fn min_sdk_version(&self) -> Option<u32> {
        self.uses_sdk_value("android:minSdkVersion")
    }

    pub fn max_sdk_version(&self) -> Option<u32> {
        self.uses_sdk_value("android:maxSdkVersion")
    }

    pub fn set_sdk_versions(&mut self, min_sdk: Option<u32>, max_sdk: Option<u32>) {
        let uses_sdk = self.root.child_or_insert(USES_SDK_ELEMENT);
        if let Some(min_sdk) = min_sdk {
            uses_sdk.set_attribute(ManifestAttribute::android("minSdkVersion", i64::from(min_sdk)));
        }
        if let Some(max_sdk) = max_sdk {
            uses_sdk.set_attribute(ManifestAttribute::android("maxSdkVersion", i64::from(max_sdk)));
        }
    }

    pub fn split_id(&self) -> Option<&str> {
        self.root.attribute_value("split").and_then(ManifestValue::as_str)
    }

    pub fn set_split_id(&mut self, split_id: impl Into<String>) {
        self.root.set_attribute(ManifestAttribute::new("split", split_id.into()));
    }

    pub fn set_config_for_split(&mut self, split_id: impl Into<String>) {
        self.root
            .set_attribute(ManifestAttribute::new("configForSplit", split_id.into()));
    }

    pub fn application_attribute(&self, name: &str) -> Option<&ManifestValue> {
        self.application()?.attribute_value(&format!("android:{name}"))
    }

    pub fn set_application_attribute(&mut self, name: &str, value: impl Into<ManifestValue>) {
        self.application_mut()
            .set_attribute(ManifestAttribute::android(name, value));
    }

    /// Whether the module asks to be fused into standalone APKs, `None` when undeclared.
    pub fn is_fused(&self) -> Option<bool> {
        self.root
            .children
            .iter()
            .find(|child| child.tag == "module" && child.namespace_prefix.as_deref() == Some("dist"))?
            .find_child("fusing")?
            .attribute_value("dist:include")?
            .as_bool()
    }

    /// Library names loaded by native activities, without the `lib` prefix and `.so` suffix.
    pub fn native_activity_libraries(&self) -> BTreeSet<String> {
        let mut libraries = BTreeSet::new();
        let Some(application) = self.application() else {
            return libraries;
        };
        for activity in application.children_named(ACTIVITY_ELEMENT) {
            let declared = activity
                .children_named(META_DATA_ELEMENT)
                .find(|meta| meta.android_name() == Some(NATIVE_ACTIVITY_LIB_NAME))
                .and_then(|meta| meta.attribute_value("android:value"))
                .and_then(ManifestValue::as_str);
            match declared {
                Some(name) => {
                    libraries.insert(name.to_string());
                }
                None if activity.android_name() == Some(NATIVE_ACTIVITY_CLASS) => {
                    libraries.insert(DEFAULT_NATIVE_ACTIVITY_LIB.to_string());
                }
                None => {}
            }
        }
        libraries
    }

    pub fn from_string(xml: &str) -> BundleResult<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let mut buffer = Vec::new();
        let mut stack: Vec<ManifestElement> = Vec::new();
        let mut root: Option<ManifestElement> = None;
        let mut ns_stack: Vec<BTreeMap<String, String>> = vec![BTreeMap::new()];

        loop {
            match reader.read_event_into(&mut buffer)? {
                Event::Start(start) => {
                    let element = read_start(&start, &mut ns_stack)?;
                    stack.push(element);
                }
                Event::Empty(start) => {
                    let element = read_start(&start, &mut ns_stack)?;
                    ns_stack.pop();
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        BundleError::Xml("Unbalanced end tag in manifest".to_string())
                    })?;
                    ns_stack.pop();
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        let raw = text.unescape()?;
                        let content = raw.trim();
                        if !content.is_empty() {
                            current.text = Some(content.to_string());
                        }
                    }
                }
                Event::CData(_)
                | Event::Comment(_)
                | Event::Decl(_)
                | Event::PI(_)
                | Event::DocType(_) => {}
                Event::Eof => break,
            }
            buffer.clear();
        }

        if !stack.is_empty() {
            return Err(BundleError::Xml("Unclosed XML elements in manifest".to_string()));
        }
        let root =
            root.ok_or_else(|| BundleError::Xml("Manifest does not have a root element".to_string()))?;
        Ok(AndroidManifest { root })
    }

    pub fn to_xml_string(&self) -> BundleResult<String> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        let mut namespaces = BTreeMap::new();
        collect_namespaces(&self.root, &mut namespaces);
        write_element(&self.root, &mut writer, &namespaces, true)?;
        String::from_utf8(writer.into_inner()).map_err(|err| BundleError::Xml(err.to_string()))
    }
}
