use crate::model::{Domain, SchemaRegistry};

use super::spec::{FilterOp, ParseError, QuerySpec, SortDir, SortKey, ViewKind};

/// What the parser needs to know about the world: the field schema per
/// domain and the current project names (for multi-word `@project` tokens).
pub struct ParserContext<'a> {
    pub schema: &'a SchemaRegistry,
    pub project_names: &'a [String],
}

/// Parse a query string into a `QuerySpec`.
///
/// The first token names the domain; an unrecognized domain is a hard
/// failure and no spec is produced. Every other problem is accumulated on
/// the spec's error list so the caller can show them all at once.
pub fn parse_query(input: &str, ctx: &ParserContext) -> Result<QuerySpec, ParseError> {
    let tokens = tokenize(input);
    let Some(first) = tokens.first() else {
        return Err(ParseError::EmptyQuery);
    };
    let domain =
        Domain::parse(first).ok_or_else(|| ParseError::UnknownDomain(first.clone()))?;

    let mut spec = QuerySpec::new(domain);
    let mut i = 1;
    while i < tokens.len() {
        let tok = &tokens[i];

        // `--`: everything after is free-text search terms.
        if tok == "--" {
            for t in &tokens[i + 1..] {
                spec.free_text.push(t.clone());
            }
            break;
        }

        if let Some(name) = tok.strip_prefix('@') {
            i = consume_project(&mut spec, name, &tokens, i, ctx);
            continue;
        }
        if let Some(tag) = tok.strip_prefix('#') {
            if !tag.is_empty() {
                spec.add_filter("tags", FilterOp::Contains, tag.to_ascii_lowercase());
            }
            i += 1;
            continue;
        }
        if let Some(clauses) = classify_priority(tok) {
            for (op, value) in clauses {
                spec.add_filter("priority", op, value);
            }
            i += 1;
            continue;
        }
        if domain == Domain::Task
            && matches!(tok.as_str(), "overdue" | "today" | "tomorrow")
        {
            spec.add_filter("due", FilterOp::Loose, tok.clone());
            i += 1;
            continue;
        }
        if classify_directive(&mut spec, tok) {
            i += 1;
            continue;
        }
        if classify_field_filter(&mut spec, tok, ctx) {
            i += 1;
            continue;
        }
        if ctx.schema.get(domain, tok).is_some() {
            spec.add_filter(tok, FilterOp::Exists, "");
            i += 1;
            continue;
        }
        spec.free_text.push(tok.clone());
        i += 1;
    }

    Ok(spec)
}

/// Split on whitespace, keeping double-quoted runs as single tokens.
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in input.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// A token with no filter/directive syntax: candidate for a multi-word
/// project name continuation or free text.
fn is_plain(tok: &str) -> bool {
    !tok.starts_with('@')
        && !tok.starts_with('#')
        && tok != "--"
        && classify_priority(tok).is_none()
        && !tok.contains([':', '=', '~', '<', '>'])
}

/// `@name` greedily consumes following plain tokens while the grown name
/// is still a prefix of some known project. Returns the next token index.
fn consume_project(
    spec: &mut QuerySpec,
    name: &str,
    tokens: &[String],
    at: usize,
    ctx: &ParserContext,
) -> usize {
    let mut name = name.to_string();
    let mut i = at + 1;
    while i < tokens.len() {
        let next = &tokens[i];
        if !is_plain(next) {
            break;
        }
        let candidate = format!("{name} {next}");
        let lower = candidate.to_lowercase();
        if ctx
            .project_names
            .iter()
            .any(|p| p.to_lowercase().starts_with(&lower))
        {
            name = candidate;
            i += 1;
        } else {
            break;
        }
    }
    spec.add_filter("project", FilterOp::Eq, name);
    i
}

/// `p1`, `p<=2`, `p>1`, `p1..3`. Returns the decomposed clauses, or None
/// when the token is not a priority pattern.
fn classify_priority(tok: &str) -> Option<Vec<(FilterOp, String)>> {
    let rest = tok.strip_prefix(['p', 'P'])?;
    if rest.len() == 1 && matches!(rest, "1" | "2" | "3") {
        return Some(vec![(FilterOp::Eq, rest.to_string())]);
    }
    for (prefix, op) in [
        ("<=", FilterOp::Le),
        (">=", FilterOp::Ge),
        ("<", FilterOp::Lt),
        (">", FilterOp::Gt),
    ] {
        if let Some(n) = rest.strip_prefix(prefix)
            && n.len() == 1
            && n.bytes().all(|b| b.is_ascii_digit())
        {
            return Some(vec![(op, n.to_string())]);
        }
    }
    // Range `pN..M` decomposes into >= N and <= M.
    if let Some((lo, hi)) = rest.split_once("..")
        && lo.len() == 1
        && hi.len() == 1
        && lo.bytes().all(|b| b.is_ascii_digit())
        && hi.bytes().all(|b| b.is_ascii_digit())
    {
        return Some(vec![
            (FilterOp::Ge, lo.to_string()),
            (FilterOp::Le, hi.to_string()),
        ]);
    }
    None
}

/// Presentation directives (`cols:`, `sort:`, `limit:`, `group:`,
/// `metrics:`, `with:`, `view:`). Returns true when the token was one.
fn classify_directive(spec: &mut QuerySpec, tok: &str) -> bool {
    let Some((name, value)) = tok.split_once(':') else {
        return false;
    };
    match name {
        "cols" | "columns" => {
            spec.directives
                .columns
                .extend(comma_list(value).map(str::to_string));
            true
        }
        "sort" => {
            for item in comma_list(value) {
                let (field, dir) = match item.as_bytes().last() {
                    Some(b'+') => (&item[..item.len() - 1], SortDir::Asc),
                    Some(b'-') => (&item[..item.len() - 1], SortDir::Desc),
                    _ => (item, SortDir::Asc),
                };
                if field.is_empty() {
                    spec.errors.push(ParseError::BadDirective {
                        directive: "sort",
                        message: format!("'{item}' has no field name"),
                    });
                } else {
                    spec.directives.sort.push(SortKey {
                        field: field.to_string(),
                        dir,
                    });
                }
            }
            true
        }
        "limit" => {
            match value.parse::<usize>() {
                Ok(n) => spec.directives.limit = Some(n),
                Err(_) => spec.errors.push(ParseError::BadDirective {
                    directive: "limit",
                    message: format!("'{value}' is not a row count"),
                }),
            }
            true
        }
        "group" => {
            spec.directives.group_by = Some(value.to_string());
            true
        }
        "metrics" => {
            spec.directives
                .metrics
                .extend(comma_list(value).map(str::to_string));
            true
        }
        "with" => {
            spec.directives
                .relations
                .extend(comma_list(value).map(str::to_string));
            true
        }
        "view" => {
            match value {
                "kanban" | "board" => spec.directives.view = Some(ViewKind::Kanban),
                "table" | "list" => spec.directives.view = Some(ViewKind::Table),
                other => spec.errors.push(ParseError::BadDirective {
                    directive: "view",
                    message: format!("'{other}' is not a view (use table or kanban)"),
                }),
            }
            true
        }
        _ => false,
    }
}

fn comma_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// `field<op>value` with `op ∈ {:, =, >=, <=, >, <, ~}` and a known field
/// name. An operator with an unknown field accumulates an error rather
/// than silently becoming free text. Returns true when the token carried
/// an operator.
fn classify_field_filter(spec: &mut QuerySpec, tok: &str, ctx: &ParserContext) -> bool {
    let Some((field, op, value)) = split_operator(tok) else {
        return false;
    };
    if field.is_empty() {
        return false;
    }
    if ctx.schema.get(spec.domain, field).is_none() {
        spec.errors.push(ParseError::UnknownField {
            domain: spec.domain,
            field: field.to_string(),
        });
        return true;
    }
    if value.is_empty() {
        spec.add_filter(field, FilterOp::Exists, "");
    } else {
        spec.add_filter(field, op, value);
    }
    true
}

/// Find the first operator occurrence, longest match first.
fn split_operator(tok: &str) -> Option<(&str, FilterOp, &str)> {
    let bytes = tok.as_bytes();
    for i in 0..bytes.len() {
        let two = tok.get(i..i + 2);
        if two == Some(">=") {
            return Some((&tok[..i], FilterOp::Ge, &tok[i + 2..]));
        }
        if two == Some("<=") {
            return Some((&tok[..i], FilterOp::Le, &tok[i + 2..]));
        }
        let op = match bytes[i] {
            b':' => FilterOp::Loose,
            b'=' => FilterOp::Eq,
            b'~' => FilterOp::Like,
            b'>' => FilterOp::Gt,
            b'<' => FilterOp::Lt,
            _ => continue,
        };
        return Some((&tok[..i], op, &tok[i + 1..]));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::spec::FilterClause;

    fn ctx_with(projects: &[&str]) -> (SchemaRegistry, Vec<String>) {
        let schema = SchemaRegistry::new();
        let names = projects.iter().map(|s| s.to_string()).collect();
        (schema, names)
    }

    fn parse(input: &str, projects: &[&str]) -> QuerySpec {
        let (schema, names) = ctx_with(projects);
        let ctx = ParserContext {
            schema: &schema,
            project_names: &names,
        };
        parse_query(input, &ctx).unwrap()
    }

    #[test]
    fn test_domain_normalization() {
        assert_eq!(parse("tasks", &[]).domain, Domain::Task);
        assert_eq!(parse("time", &[]).domain, Domain::TimeLog);
        assert_eq!(parse("projects", &[]).domain, Domain::Project);
    }

    #[test]
    fn test_unknown_domain_is_hard_failure() {
        let (schema, names) = ctx_with(&[]);
        let ctx = ParserContext {
            schema: &schema,
            project_names: &names,
        };
        assert_eq!(
            parse_query("widgets p1", &ctx),
            Err(ParseError::UnknownDomain("widgets".into()))
        );
        assert_eq!(parse_query("", &ctx), Err(ParseError::EmptyQuery));
    }

    #[test]
    fn test_scenario_due_today_priority() {
        let spec = parse("task due:today p<=2", &[]);
        assert!(spec.is_valid());
        assert_eq!(
            spec.filters.get("due").unwrap(),
            &vec![FilterClause {
                op: FilterOp::Loose,
                value: "today".into()
            }]
        );
        assert_eq!(
            spec.filters.get("priority").unwrap(),
            &vec![FilterClause {
                op: FilterOp::Le,
                value: "2".into()
            }]
        );
    }

    #[test]
    fn test_scenario_cols_and_sort() {
        let spec = parse("task cols:id,text sort:due+", &[]);
        assert_eq!(spec.directives.columns, vec!["id", "text"]);
        assert_eq!(
            spec.directives.sort,
            vec![SortKey {
                field: "due".into(),
                dir: SortDir::Asc
            }]
        );
    }

    #[test]
    fn test_sort_descending_and_multi() {
        let spec = parse("task sort:priority-,due", &[]);
        assert_eq!(
            spec.directives.sort,
            vec![
                SortKey {
                    field: "priority".into(),
                    dir: SortDir::Desc
                },
                SortKey {
                    field: "due".into(),
                    dir: SortDir::Asc
                },
            ]
        );
    }

    #[test]
    fn test_project_single_word() {
        let spec = parse("task @acme", &[]);
        assert_eq!(
            spec.filters.get("project").unwrap(),
            &vec![FilterClause {
                op: FilterOp::Eq,
                value: "acme".into()
            }]
        );
    }

    #[test]
    fn test_project_multi_word_greedy() {
        let spec = parse(
            "task @acme website redesign p1",
            &["acme website redesign", "acme mobile"],
        );
        assert_eq!(
            spec.filters.get("project").unwrap(),
            &vec![FilterClause {
                op: FilterOp::Eq,
                value: "acme website redesign".into()
            }]
        );
        // p1 after the name still classified as priority
        assert!(spec.has_filter_on("priority"));
    }

    #[test]
    fn test_project_greedy_stops_at_unknown_word() {
        let spec = parse("task @acme launch", &["acme"]);
        assert_eq!(
            spec.filters.get("project").unwrap(),
            &vec![FilterClause {
                op: FilterOp::Eq,
                value: "acme".into()
            }]
        );
        assert_eq!(spec.free_text, vec!["launch"]);
    }

    #[test]
    fn test_project_greedy_stops_at_prefixed_token() {
        let spec = parse("task @acme #web", &["acme website"]);
        assert_eq!(
            spec.filters.get("project").unwrap(),
            &vec![FilterClause {
                op: FilterOp::Eq,
                value: "acme".into()
            }]
        );
        assert_eq!(
            spec.filters.get("tags").unwrap(),
            &vec![FilterClause {
                op: FilterOp::Contains,
                value: "web".into()
            }]
        );
    }

    #[test]
    fn test_tag_filter_lowercased() {
        let spec = parse("task #Urgent", &[]);
        assert_eq!(
            spec.filters.get("tags").unwrap(),
            &vec![FilterClause {
                op: FilterOp::Contains,
                value: "urgent".into()
            }]
        );
    }

    #[test]
    fn test_priority_range_decomposes() {
        let spec = parse("task p1..3", &[]);
        assert_eq!(
            spec.filters.get("priority").unwrap(),
            &vec![
                FilterClause {
                    op: FilterOp::Ge,
                    value: "1".into()
                },
                FilterClause {
                    op: FilterOp::Le,
                    value: "3".into()
                },
            ]
        );
    }

    #[test]
    fn test_priority_relational_forms() {
        assert_eq!(
            parse("task p>=2", &[]).filters.get("priority").unwrap()[0].op,
            FilterOp::Ge
        );
        assert_eq!(
            parse("task p<3", &[]).filters.get("priority").unwrap()[0].op,
            FilterOp::Lt
        );
    }

    #[test]
    fn test_p_token_not_priority_falls_through() {
        // "p5" matches no priority pattern and is not a field: free text
        let spec = parse("task p5", &[]);
        assert!(!spec.has_filter_on("priority"));
        assert_eq!(spec.free_text, vec!["p5"]);
    }

    #[test]
    fn test_bare_keywords_task_domain_only() {
        let spec = parse("task overdue", &[]);
        assert_eq!(
            spec.filters.get("due").unwrap(),
            &vec![FilterClause {
                op: FilterOp::Loose,
                value: "overdue".into()
            }]
        );
        // In the project domain the same word is free text
        let spec = parse("project overdue", &[]);
        assert!(!spec.has_filter_on("due"));
        assert_eq!(spec.free_text, vec!["overdue"]);
    }

    #[test]
    fn test_limit_group_view() {
        let spec = parse("task limit:20 group:status view:kanban", &[]);
        assert_eq!(spec.directives.limit, Some(20));
        assert_eq!(spec.directives.group_by.as_deref(), Some("status"));
        assert_eq!(spec.directives.view, Some(ViewKind::Kanban));
    }

    #[test]
    fn test_bad_limit_accumulates_error() {
        let spec = parse("task limit:lots p1", &[]);
        assert!(!spec.is_valid());
        assert_eq!(spec.errors.len(), 1);
        // The rest of the query still parsed
        assert!(spec.has_filter_on("priority"));
    }

    #[test]
    fn test_unknown_filter_field_is_error() {
        let spec = parse("task flavor:sweet", &[]);
        assert_eq!(
            spec.errors,
            vec![ParseError::UnknownField {
                domain: Domain::Task,
                field: "flavor".into()
            }]
        );
    }

    #[test]
    fn test_errors_accumulate() {
        let spec = parse("task flavor:sweet limit:x", &[]);
        assert_eq!(spec.errors.len(), 2);
    }

    #[test]
    fn test_bare_known_field_is_exists() {
        let spec = parse("task due", &[]);
        assert_eq!(
            spec.filters.get("due").unwrap(),
            &vec![FilterClause {
                op: FilterOp::Exists,
                value: "".into()
            }]
        );
    }

    #[test]
    fn test_generic_operators() {
        let spec = parse("task status=done text~report due>=2025-01-01", &[]);
        assert_eq!(spec.filters.get("status").unwrap()[0].op, FilterOp::Eq);
        assert_eq!(spec.filters.get("text").unwrap()[0].op, FilterOp::Like);
        assert_eq!(spec.filters.get("due").unwrap()[0].op, FilterOp::Ge);
        assert_eq!(spec.filters.get("due").unwrap()[0].value, "2025-01-01");
    }

    #[test]
    fn test_free_text_and_quotes() {
        let spec = parse("task fix \"login page\" bug", &[]);
        assert_eq!(spec.free_text, vec!["fix", "login page", "bug"]);
    }

    #[test]
    fn test_double_dash_forces_free_text() {
        let spec = parse("task -- p1 due:today", &[]);
        assert!(!spec.has_filter_on("priority"));
        assert_eq!(spec.free_text, vec!["p1", "due:today"]);
    }

    #[test]
    fn test_metrics_and_relations() {
        let spec = parse("task metrics:time_week,age_days with:project", &[]);
        assert_eq!(spec.directives.metrics, vec!["time_week", "age_days"]);
        assert_eq!(spec.directives.relations, vec!["project"]);
    }
}
