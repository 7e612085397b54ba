//! Page-context functions evaluated by the session driver
//!
//! Each script is a single anonymous function taking one JSON argument. The
//! driver serializes the argument and invokes the function in the page.

/// Find the first node matching `{kind, expr}` and read `attribute`
/// (or `textContent` when `attribute` is null).
///
/// Returns `{found: bool, value: string | null}`. An invalid expression
/// counts as no match.
pub const PROBE_NODE: &str = r#"
function (args) {
    let node = null;
    try {
        if (args.kind === "xpath") {
            node = document.evaluate(
                args.expr, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null
            ).singleNodeValue;
        } else {
            node = document.querySelector(args.expr);
        }
    } catch (e) {
        return { found: false, value: null };
    }
    if (!node) {
        return { found: false, value: null };
    }
    const value = args.attribute === null ? node.textContent : node.getAttribute(args.attribute);
    return { found: true, value: value === undefined ? null : value };
}
"#;

/// Find the first node matching `{kind, expr}` and simulate a click on it.
///
/// Returns `true` only when a node was found and clicked.
pub const ACTIVATE_NODE: &str = r#"
function (args) {
    let node = null;
    try {
        if (args.kind === "xpath") {
            node = document.evaluate(
                args.expr, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null
            ).singleNodeValue;
        } else {
            node = document.querySelector(args.expr);
        }
    } catch (e) {
        return false;
    }
    if (!node) {
        return false;
    }
    if (typeof node.click === "function") {
        node.click();
    } else {
        node.dispatchEvent(new MouseEvent("click", { bubbles: true, cancelable: true }));
    }
    return true;
}
"#;

/// Resolves once `document.readyState` is complete and no resource has
/// finished loading for `quietMs`. Used as the network-idle signal.
pub const WAIT_NETWORK_QUIET: &str = r#"
function (args) {
    return new Promise((resolve) => {
        const lastActivity = () => {
            const entries = performance.getEntriesByType("resource");
            return entries.length === 0
                ? 0
                : Math.max(...entries.map((e) => e.responseEnd));
        };
        const check = () => {
            if (document.readyState === "complete"
                && performance.now() - lastActivity() >= args.quietMs) {
                resolve(true);
            } else {
                setTimeout(check, 100);
            }
        };
        check();
    });
}
"#;

/// Wrap a function source and its JSON argument into a call expression.
pub fn invocation(function: &str, args: &serde_json::Value) -> String {
    format!("({})({})", function.trim(), args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_embeds_json_argument() {
        let expr = invocation(
            "function (args) { return args.expr; }",
            &serde_json::json!({ "kind": "css", "expr": "a[href*=\"x\"]" }),
        );
        assert!(expr.starts_with("(function (args) { return args.expr; })({"));
        assert!(expr.ends_with("})"));
        assert!(expr.contains(r#""expr":"a[href*=\"x\"]""#));
        assert!(expr.contains(r#""kind":"css""#));
    }
}
