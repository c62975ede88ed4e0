//! Placeholder substitution for guard command templates.

/// Values bound to `$stone`, `$route`, `$hash` and `$output`.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars<'a> {
    pub stone: &'a str,
    pub route: &'a str,
    /// Review-input-hash for reviews, judge-input-hash for judges.
    pub hash: &'a str,
    pub output: &'a str,
}

impl TemplateVars<'_> {
    fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            "stone" => Some(self.stone),
            "route" => Some(self.route),
            "hash" => Some(self.hash),
            "output" => Some(self.output),
            _ => None,
        }
    }
}

/// Substitute placeholders verbatim in a single left-to-right pass.
///
/// Values are not shell-escaped and are never re-scanned, so a route path that
/// happens to contain `$hash` is inserted as-is. Unknown `$names` are kept.
pub fn render(template: &str, vars: &TemplateVars<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        match vars.lookup(&after[..name_len]) {
            Some(value) => {
                out.push_str(value);
                rest = &after[name_len..];
            }
            None => {
                out.push('$');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> TemplateVars<'static> {
        TemplateVars {
            stone: "1.vision",
            route: "/work/route",
            hash: "abcd",
            output: "/work/route/.route/out.md",
        }
    }

    #[test]
    fn substitutes_all_placeholders() {
        let rendered = render("review --stone $stone --route $route --hash $hash > $output", &vars());
        assert_eq!(
            rendered,
            "review --stone 1.vision --route /work/route --hash abcd > /work/route/.route/out.md"
        );
    }

    #[test]
    fn keeps_unknown_and_shell_variables() {
        assert_eq!(render("echo $HOME $stones $", &vars()), "echo $HOME $stones $");
    }

    #[test]
    fn values_are_not_rescanned() {
        let vars = TemplateVars {
            route: "/tmp/$hash",
            ..vars()
        };
        assert_eq!(render("$route/$hash", &vars), "/tmp/$hash/abcd");
    }
}
