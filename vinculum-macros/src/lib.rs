mod utils;

use proc_macro::{Delimiter, Group, TokenStream, TokenTree};

/// Runs an `async fn` test to completion through `vinculum::sync_wait`.
///
/// The test may return `()` or `vinculum::Result<()>`; a returned error, or
/// a panic captured by the task, fails the test.
///
/// ```rust,ignore
/// #[vinculum::test]
/// async fn reads_back() -> vinculum::Result<()> {
///     let value = vinculum::Task::ready(3).await?;
///     assert_eq!(value, 3);
///     Ok(())
/// }
/// ```
#[proc_macro_attribute]
pub fn test(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut tokens = item.into_iter().collect::<Vec<_>>();

    if !utils::remove_ident(&mut tokens, "async") {
        return utils::compile_error("#[vinculum::test] expects an `async fn`");
    }

    let returns_result = utils::take_return_type(&mut tokens);

    let Some(pos) = utils::body_position(&tokens) else {
        return utils::compile_error("#[vinculum::test] expects a function body");
    };

    let block = match &tokens[pos] {
        TokenTree::Group(g) => g.stream().to_string(),
        _ => unreachable!(),
    };

    let task = if returns_result {
        format!("::vinculum::Task::new(async move {{ {block} }})")
    } else {
        format!("::vinculum::Task::from_future(async move {{ {block} }})")
    };

    let new_block = format!(
        "{{
        if let ::core::result::Result::Err(error) = ::vinculum::sync_wait({task}) {{
            ::core::panic!(\"test task failed: {{error}}\");
        }}
    }}"
    );

    tokens[pos] = TokenTree::Group(Group::new(
        Delimiter::Brace,
        new_block.parse().unwrap(),
    ));

    let test_attr: TokenStream = "#[test]".parse().unwrap();
    let mut result: Vec<TokenTree> = test_attr.into_iter().collect();
    result.extend(tokens);

    result.into_iter().collect()
}
