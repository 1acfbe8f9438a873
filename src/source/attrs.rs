use crate::descriptor::RenameRule;
use log::{debug, warn};
use syn::meta::ParseNestedMeta;
use syn::{Attribute, Expr, ExprLit, Lit, LitStr, Token};

/// The serde attributes that shape the wire form of a container, field or variant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerdeAttrs {
    pub rename: Option<String>,
    pub rename_all: Option<RenameRule>,
    /// `#[serde(default)]` or `#[serde(default = "path")]`
    pub default: bool,
    pub skip: bool,
    pub flatten: bool,
}

impl SerdeAttrs {
    /// Read every `#[serde(...)]` attribute in `attrs`.
    ///
    /// Attributes that fail to parse are logged and ignored.
    pub fn parse(attrs: &[Attribute]) -> Self {
        let mut serde = SerdeAttrs::default();

        for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
            if let Err(e) = attr.parse_nested_meta(|meta| serde.apply(meta)) {
                warn!("Ignoring malformed serde attribute: {}", e);
            }
        }

        serde
    }

    fn apply(&mut self, meta: ParseNestedMeta) -> syn::Result<()> {
        if meta.path.is_ident("rename") {
            if meta.input.peek(Token![=]) {
                self.rename = Some(meta.value()?.parse::<LitStr>()?.value());
            } else {
                // rename(serialize = "..", deserialize = "..") documents the serialized form
                meta.parse_nested_meta(|inner| {
                    let value = inner.value()?.parse::<LitStr>()?.value();
                    if inner.path.is_ident("serialize") {
                        self.rename = Some(value);
                    }
                    Ok(())
                })?;
            }
        } else if meta.path.is_ident("rename_all") {
            if meta.input.peek(Token![=]) {
                let value = meta.value()?.parse::<LitStr>()?.value();
                self.rename_all = parse_rule(&value);
            } else {
                meta.parse_nested_meta(|inner| {
                    let value = inner.value()?.parse::<LitStr>()?.value();
                    if inner.path.is_ident("serialize") {
                        self.rename_all = parse_rule(&value);
                    }
                    Ok(())
                })?;
            }
        } else if meta.path.is_ident("default") {
            if meta.input.peek(Token![=]) {
                meta.value()?.parse::<LitStr>()?;
            }
            self.default = true;
        } else if meta.path.is_ident("skip") {
            self.skip = true;
        } else if meta.path.is_ident("flatten") {
            self.flatten = true;
        } else {
            debug!("Ignoring serde attribute {:?}", meta.path.get_ident().map(ToString::to_string));
            skip_meta(&meta)?;
        }
        Ok(())
    }
}

fn parse_rule(value: &str) -> Option<RenameRule> {
    let rule = RenameRule::parse(value);
    if rule.is_none() {
        warn!("Unknown serde rename_all rule \"{}\"", value);
    }
    rule
}

/// Consume whatever follows an attribute key we do not interpret
fn skip_meta(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|nested| skip_meta(&nested))?;
    }
    Ok(())
}

/// Text of the `///` doc comments in `attrs`, trimmed and joined by newlines
pub fn doc_comment(attrs: &[Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|a| a.path().is_ident("doc"))
        .filter_map(|a| match &a.meta {
            syn::Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(ExprLit { lit: Lit::Str(s), .. }) => Some(s.value().trim().to_string()),
                _ => None,
            },
            _ => None,
        })
        .collect();

    let text = lines.join("\n").trim().to_string();
    (!text.is_empty()).then_some(text)
}
