use proc_macro::{Delimiter, TokenStream, TokenTree};

/// Removes the first identifier equal to `name`.
///
/// Returns `true` if one was found.
pub(crate) fn remove_ident(tokens: &mut Vec<TokenTree>, name: &str) -> bool {
    let Some(pos) = tokens
        .iter()
        .position(|t| matches!(t, TokenTree::Ident(id) if id.to_string() == name))
    else {
        return false;
    };

    tokens.remove(pos);
    true
}

/// Returns the position of the function body, the last brace-delimited
/// group of the item.
pub(crate) fn body_position(tokens: &[TokenTree]) -> Option<usize> {
    tokens
        .iter()
        .rposition(|t| matches!(t, TokenTree::Group(g) if g.delimiter() == Delimiter::Brace))
}

/// Strips the `-> Type` clause of the function signature.
///
/// Returns `true` if a return type was removed.
pub(crate) fn take_return_type(tokens: &mut Vec<TokenTree>) -> bool {
    let Some(body) = body_position(tokens) else {
        return false;
    };

    let Some(fn_pos) = tokens
        .iter()
        .position(|t| matches!(t, TokenTree::Ident(id) if id.to_string() == "fn"))
    else {
        return false;
    };

    let Some(params) = tokens[fn_pos..body]
        .iter()
        .position(|t| matches!(t, TokenTree::Group(g) if g.delimiter() == Delimiter::Parenthesis))
        .map(|offset| fn_pos + offset)
    else {
        return false;
    };

    let is_arrow = matches!(
        (tokens.get(params + 1), tokens.get(params + 2)),
        (Some(TokenTree::Punct(p1)), Some(TokenTree::Punct(p2)))
            if p1.as_char() == '-' && p2.as_char() == '>'
    );

    if !is_arrow {
        return false;
    }

    // Keep a trailing `where` clause, if any.
    let end = tokens[params..body]
        .iter()
        .position(|t| matches!(t, TokenTree::Ident(id) if id.to_string() == "where"))
        .map_or(body, |offset| params + offset);

    tokens.drain(params + 1..end);
    true
}

/// Expands to a `compile_error!` carrying `message`.
pub(crate) fn compile_error(message: &str) -> TokenStream {
    format!("::core::compile_error!({message:?});").parse().unwrap()
}
