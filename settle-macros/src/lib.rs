//! Attribute macros for the `settle` crate.
//!
//! `#[settle::main]` and `#[settle::test]` turn an `async fn` into a
//! synchronous one that builds a scheduler and blocks on the body.
//!
//! Both accept the same options:
//! - `virtual_time`: run on a virtual clock
//! - `max_ticks = N`: stop the loop after `N` ticks
//!
//! The function may take a single `Scheduler` parameter, which is bound to
//! the scheduler driving the body.

mod utils;

use proc_macro::{Delimiter, Group, TokenStream, TokenTree};

/// Runs an `async fn main` on a fresh scheduler.
///
/// # Examples
///
/// ```rust,ignore
/// #[settle::main(virtual_time)]
/// async fn main(scheduler: settle::Scheduler) {
///     settle::time::sleep(&scheduler, Duration::from_secs(1)).await.ok();
/// }
/// ```
#[proc_macro_attribute]
pub fn main(attr: TokenStream, item: TokenStream) -> TokenStream {
    expand(attr, item).unwrap_or_else(|msg| utils::compile_error(&msg))
}

/// Runs an `async fn` test on a fresh scheduler.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let expanded = match expand(attr, item) {
        Ok(tokens) => tokens,
        Err(msg) => return utils::compile_error(&msg),
    };

    let mut result: TokenStream = "#[test]".parse().unwrap_or_default();
    result.extend(expanded);
    result
}

fn expand(attr: TokenStream, item: TokenStream) -> Result<TokenStream, String> {
    let builder = builder_from_attr(attr)?;
    let mut tokens: Vec<TokenTree> = item.into_iter().collect();

    if let Some(pos) = tokens
        .iter()
        .position(|t| matches!(t, TokenTree::Ident(id) if id.to_string() == "async"))
    {
        tokens.remove(pos);
    }

    let binding = take_scheduler_param(&mut tokens)?;

    let Some(pos) = tokens
        .iter()
        .rposition(|t| matches!(t, TokenTree::Group(g) if g.delimiter() == Delimiter::Brace))
    else {
        return Err(String::from("expected a function body"));
    };

    let body = match &tokens[pos] {
        TokenTree::Group(g) => g.stream().to_string(),
        _ => unreachable!(),
    };

    let bind = binding
        .map(|name| format!("let {name} = __scheduler.clone();"))
        .unwrap_or_default();

    let block = format!(
        "{{
            let __scheduler = {builder};
            {bind}
            __scheduler
                .block_on(async move {{ {body} }})
                .expect(\"scheduler stopped before the body completed\")
        }}"
    );

    let stream = block
        .parse::<TokenStream>()
        .map_err(|err| format!("settle macro error: {err}"))?;
    tokens[pos] = TokenTree::Group(Group::new(Delimiter::Brace, stream));

    Ok(tokens.into_iter().collect())
}

/// Builds the scheduler constructor expression from the attribute options.
fn builder_from_attr(attr: TokenStream) -> Result<String, String> {
    let mut builder = String::from("::settle::Scheduler::builder()");

    for option in utils::split_args(attr) {
        let option = utils::tokens_to_string(&option);
        let option = option.trim();

        if option == "virtual_time" {
            builder.push_str(".virtual_time()");
        } else if let Some(value) = option.strip_prefix("max_ticks") {
            let value = value.trim_start().trim_start_matches('=').trim();
            let limit = value
                .parse::<u64>()
                .ok()
                .filter(|limit| *limit > 0)
                .ok_or_else(|| format!("invalid `max_ticks` value `{value}`"))?;

            builder.push_str(&format!(".max_ticks({limit})"));
        } else {
            return Err(format!("unknown option `{option}`"));
        }
    }

    builder.push_str(".build()");
    Ok(builder)
}

/// Removes the optional `name: Scheduler` parameter from the signature and
/// returns the name it binds.
fn take_scheduler_param(tokens: &mut [TokenTree]) -> Result<Option<String>, String> {
    let Some(fn_pos) = tokens
        .iter()
        .position(|t| matches!(t, TokenTree::Ident(id) if id.to_string() == "fn"))
    else {
        return Err(String::from("expected an `async fn`"));
    };

    let Some(offset) = tokens[fn_pos..]
        .iter()
        .position(|t| matches!(t, TokenTree::Group(g) if g.delimiter() == Delimiter::Parenthesis))
    else {
        return Err(String::from("expected a parameter list"));
    };
    let pos = fn_pos + offset;

    let params = match &tokens[pos] {
        TokenTree::Group(g) => utils::split_args(g.stream()),
        _ => unreachable!(),
    };

    let name = match params.as_slice() {
        [] => return Ok(None),
        [param] => param
            .iter()
            .find_map(|t| match t {
                TokenTree::Ident(id) if id.to_string() != "mut" => Some(id.to_string()),
                _ => None,
            })
            .ok_or_else(|| String::from("expected `name: Scheduler`"))?,
        _ => return Err(String::from("expected at most one `Scheduler` parameter")),
    };

    tokens[pos] = TokenTree::Group(Group::new(Delimiter::Parenthesis, TokenStream::new()));
    Ok(Some(name))
}
