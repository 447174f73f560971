//! `<queries>`: the packages, intents and providers an app may see

use super::walker::walk_children;
use super::Ctx;
use crate::document::{Attrs, XmlCursor};
use crate::model::{IntentFilter, PackageBuilder};
use crate::result::{done, ParseError, ParseResult, Step};

pub(super) fn parse_queries<'d>(
    ctx: &Ctx<'d, '_>,
    pkg: &mut PackageBuilder,
    cursor: &mut XmlCursor<'d>,
) -> Step {
    walk_children(cursor, "<queries>", ctx.policy, |tag, cursor| match tag {
        "intent" => Some(parse_query_intent(ctx, cursor).and_then(|filter| {
            pkg.queries.intents.push(filter);
            done()
        })),
        "package" => Some(
            match ctx.attrs(cursor).non_config_string("name").filter(|n| !n.is_empty()) {
                Some(name) => {
                    pkg.queries.packages.push(name);
                    done()
                }
                None => Err(ParseError::malformed("Package name is missing from package tag.")),
            },
        ),
        "provider" => Some(parse_query_provider(&ctx.attrs(cursor), pkg)),
        _ => None,
    })?;
    done()
}

fn parse_query_provider(attrs: &Attrs<'_>, pkg: &mut PackageBuilder) -> Step {
    let Some(authorities) = attrs.non_config_string("authorities").filter(|a| !a.is_empty()) else {
        return Err(ParseError::malformed("Authority missing from provider tag."));
    };
    pkg.queries.provider_authorities.extend(
        authorities
            .split(';')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string),
    );
    done()
}

/// Set a single-valued field of a query intent
fn set_once(slot: &mut Vec<String>, value: Option<String>, what: &str) -> ParseResult<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !slot.is_empty() {
        return Err(ParseError::malformed(format!(
            "intent tag may have at most one {}.",
            what
        )));
    }
    slot.push(value);
    Ok(())
}

fn parse_query_data(attrs: &Attrs<'_>, filter: &mut IntentFilter) -> Step {
    set_once(&mut filter.mime_types, attrs.non_config_string("mimeType"), "data type")?;
    set_once(&mut filter.schemes, attrs.non_config_string("scheme"), "data scheme")?;
    set_once(&mut filter.hosts, attrs.non_config_string("host"), "data host")?;
    if let Some(path) = attrs
        .non_config_string("path")
        .or_else(|| attrs.non_config_string("pathPrefix"))
        .or_else(|| attrs.non_config_string("pathPattern"))
    {
        filter.paths.push(path);
    }
    done()
}

fn parse_query_intent<'d>(ctx: &Ctx<'d, '_>, cursor: &mut XmlCursor<'d>) -> ParseResult<IntentFilter> {
    let mut filter = IntentFilter::default();
    let mut has_data = false;

    walk_children(cursor, "<intent>", ctx.policy, |tag, cursor| {
        let attrs = ctx.attrs(cursor);
        match tag {
            "action" => Some(match attrs.non_config_string("name").filter(|n| !n.is_empty()) {
                None => Err(ParseError::malformed("Failed to resolve queries intent action")),
                Some(action) => set_once(&mut filter.actions, Some(action), "action").and_then(|_| done()),
            }),
            "category" => Some(match attrs.non_config_string("name").filter(|n| !n.is_empty()) {
                None => Err(ParseError::malformed("Failed to resolve queries intent category")),
                Some(category) => {
                    filter.categories.push(category);
                    done()
                }
            }),
            "data" => {
                has_data = true;
                Some(parse_query_data(&attrs, &mut filter))
            }
            _ => None,
        }
    })?;

    if filter.actions.is_empty() && !has_data {
        return Err(ParseError::malformed(
            "intent tags must contain either an action or data.",
        ));
    }
    Ok(filter)
}
