//! Response wrapping for RPC clients.
//!
//! Clients expect every result as `{success: true, <field>: ...}`. The index
//! returns bare values; this module names the field each method's value lands
//! in.

use serde_json::{json, Value};

/// Wrap a raw index result under the field clients read for `method`.
pub fn wrap_response(method: &str, result: Value) -> Value {
    match method {
        // List wrappers
        "search_slugs" => {
            json!({
                "success": true,
                "results": if result.is_null() { json!([]) } else { result }
            })
        }

        "list_articles" => {
            json!({
                "success": true,
                "articles": if result.is_null() { json!([]) } else { result }
            })
        }

        // Scalar wrappers
        "slug_exists" => {
            json!({
                "success": true,
                "exists": result.as_bool().unwrap_or(false)
            })
        }

        "find_best_match" => {
            json!({
                "success": true,
                "match": result
            })
        }

        "total_count" => {
            json!({
                "success": true,
                "count": result.as_u64().unwrap_or(0)
            })
        }

        "slug_lastmod" => {
            json!({
                "success": true,
                "lastmod": result
            })
        }

        // Dict wrappers
        "index_status" => {
            json!({
                "success": true,
                "status": if result.is_null() { json!({}) } else { result }
            })
        }

        // Default: return as-is (for methods not explicitly handled)
        _ => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_search_results() {
        let wrapped = wrap_response("search_slugs", json!(["Albert_Einstein"]));
        assert!(wrapped.get("success").unwrap().as_bool().unwrap());
        assert_eq!(wrapped.get("results").unwrap(), &json!(["Albert_Einstein"]));
    }

    #[test]
    fn test_wrap_null_list() {
        let wrapped = wrap_response("list_articles", Value::Null);
        assert_eq!(wrapped.get("articles").unwrap(), &json!([]));
    }

    #[test]
    fn test_wrap_missing_match_keeps_null() {
        let wrapped = wrap_response("find_best_match", Value::Null);
        assert!(wrapped.get("success").unwrap().as_bool().unwrap());
        assert_eq!(wrapped.get("match").unwrap(), &Value::Null);
    }

    #[test]
    fn test_wrap_scalars() {
        assert_eq!(
            wrap_response("slug_exists", json!(true)),
            json!({"success": true, "exists": true})
        );
        assert_eq!(
            wrap_response("total_count", json!(42)),
            json!({"success": true, "count": 42})
        );
    }

    #[test]
    fn test_unknown_method_passthrough() {
        let data = json!({"status": "ok"});
        assert_eq!(wrap_response("health_check", data.clone()), data);
    }
}
