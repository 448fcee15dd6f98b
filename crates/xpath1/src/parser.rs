//! A `nom` grammar for the XPath 1.0 expression language.

use crate::ast::*;
use crate::error::XPathError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0, satisfy},
    combinator::{map, not, opt, recognize},
    multi::{fold_many0, many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated},
};

type PError<'a> = nom::error::Error<&'a str>;

/// Parses a complete expression; trailing input is a syntax error.
pub fn parse_expression(input: &str) -> Result<Expr, XPathError> {
    match expr(input.trim()) {
        Ok(("", parsed)) => Ok(parsed),
        Ok((rest, _)) => Err(XPathError::Syntax(
            input.to_string(),
            format!("unconsumed trailing input: '{rest}'"),
        )),
        Err(e) => Err(XPathError::Syntax(input.to_string(), e.to_string())),
    }
}

// --- Combinator helpers ---

fn ws<'a, F, O>(inner: F) -> impl Parser<&'a str, Output = O, Error = PError<'a>>
where
    F: Parser<&'a str, Output = O, Error = PError<'a>>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// A left-associative chain of `operand (operator operand)*`.
fn infix<'a, P, O>(operand: P, operator: O) -> impl FnMut(&'a str) -> IResult<&'a str, Expr>
where
    P: Fn(&'a str) -> IResult<&'a str, Expr>,
    O: Parser<&'a str, Output = BinaryOp, Error = PError<'a>> + Clone,
{
    move |input| {
        let (rest, first) = operand(input)?;
        fold_many0(
            pair(ws(operator.clone()), &operand),
            move || first.clone(),
            |lhs, (op, rhs)| Expr::binary(lhs, op, rhs),
        )
        .parse(rest)
    }
}

/// A named operator (`or`, `div`, ...) that must end at a name boundary, so
/// that e.g. `ordinal` is not split into `or` + `dinal`.
fn named_op<'a>(
    kw: &'static str,
    op: BinaryOp,
) -> impl Fn(&'a str) -> IResult<&'a str, BinaryOp> + Clone {
    move |input| map(terminated(tag(kw), not(satisfy(is_name_char))), |_| op).parse(input)
}

// --- Expression levels, loosest binding first ---

fn expr(input: &str) -> IResult<&str, Expr> {
    or_expr(input)
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    infix(and_expr, named_op("or", BinaryOp::Or))(input)
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    infix(equality_expr, named_op("and", BinaryOp::And))(input)
}

fn equality_op(input: &str) -> IResult<&str, BinaryOp> {
    alt((
        map(tag("!="), |_| BinaryOp::NotEq),
        map(tag("="), |_| BinaryOp::Eq),
    ))
    .parse(input)
}

fn equality_expr(input: &str) -> IResult<&str, Expr> {
    infix(relational_expr, equality_op)(input)
}

fn relational_op(input: &str) -> IResult<&str, BinaryOp> {
    alt((
        map(tag("<="), |_| BinaryOp::LtEq),
        map(tag(">="), |_| BinaryOp::GtEq),
        map(tag("<"), |_| BinaryOp::Lt),
        map(tag(">"), |_| BinaryOp::Gt),
    ))
    .parse(input)
}

fn relational_expr(input: &str) -> IResult<&str, Expr> {
    infix(additive_expr, relational_op)(input)
}

fn additive_op(input: &str) -> IResult<&str, BinaryOp> {
    alt((
        map(char('+'), |_| BinaryOp::Add),
        map(char('-'), |_| BinaryOp::Sub),
    ))
    .parse(input)
}

fn additive_expr(input: &str) -> IResult<&str, Expr> {
    infix(multiplicative_expr, additive_op)(input)
}

fn multiplicative_op(input: &str) -> IResult<&str, BinaryOp> {
    alt((
        map(char('*'), |_| BinaryOp::Mul),
        named_op("div", BinaryOp::Div),
        named_op("mod", BinaryOp::Mod),
    ))
    .parse(input)
}

fn multiplicative_expr(input: &str) -> IResult<&str, Expr> {
    infix(unary_expr, multiplicative_op)(input)
}

fn unary_expr(input: &str) -> IResult<&str, Expr> {
    let (rest, minuses) = many0(ws(char('-'))).parse(input)?;
    let (rest, mut parsed) = union_expr(rest)?;
    for _ in &minuses {
        parsed = Expr::Negate(Box::new(parsed));
    }
    Ok((rest, parsed))
}

fn union_op(input: &str) -> IResult<&str, BinaryOp> {
    map(char('|'), |_| BinaryOp::Union).parse(input)
}

fn union_expr(input: &str) -> IResult<&str, Expr> {
    infix(path_expr, union_op)(input)
}

/// The pivot between primary expressions and location paths. A primary
/// expression must be tried first so that `position()` is parsed as a call
/// rather than a step named `position`; a primary may then continue as a path
/// (`$var/item`).
fn path_expr(input: &str) -> IResult<&str, Expr> {
    let (rest, head) =
        preceded(multispace0, alt((primary_expr, map(location_path, Expr::Path)))).parse(input)?;
    let (rest, tail) = many0(pair(alt((tag("//"), tag("/"))), step)).parse(rest)?;
    if tail.is_empty() {
        return Ok((rest, head));
    }

    let (start, absolute, mut steps) = match head {
        Expr::Path(p) => (p.start, p.absolute, p.steps),
        other => (Some(Box::new(other)), false, Vec::new()),
    };
    for (sep, next) in tail {
        if sep == "//" {
            steps.push(Step::any_descendant());
        }
        steps.push(next);
    }
    Ok((
        rest,
        Expr::Path(LocationPath {
            start,
            absolute,
            steps,
        }),
    ))
}

fn primary_expr(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        map(preceded(char('$'), qname), Expr::Var),
        function_call,
        map(number, Expr::Number),
        map(string_literal, Expr::Literal),
        delimited(ws(char('(')), expr, ws(char(')'))),
    )))
    .parse(input)
}

// --- Literals and names ---

/// XPath numbers have no exponent notation and no textual forms: digits with
/// an optional fraction, or a bare fraction like `.5`.
fn number(input: &str) -> IResult<&str, f64> {
    let (rest, text) = recognize(alt((
        recognize((
            take_while1(|c: char| c.is_ascii_digit()),
            opt(pair(char('.'), take_while(|c: char| c.is_ascii_digit()))),
        )),
        recognize(pair(char('.'), take_while1(|c: char| c.is_ascii_digit()))),
    )))
    .parse(input)?;
    Ok((rest, text.parse().unwrap_or(f64::NAN)))
}

fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        alt((
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
        )),
        |s: &str| s.to_string(),
    )
    .parse(input)
}

fn ncname(input: &str) -> IResult<&str, &str> {
    recognize(pair(satisfy(is_name_start), take_while(is_name_char))).parse(input)
}

fn qname(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(ncname, opt(pair(char(':'), ncname)))),
        |s: &str| s.to_string(),
    )
    .parse(input)
}

// --- Node tests and steps ---

fn kind_test(input: &str) -> IResult<&str, NodeTest> {
    map(
        terminated(
            alt((
                tag("text"),
                tag("comment"),
                tag("processing-instruction"),
                tag("node"),
            )),
            pair(ws(char('(')), char(')')),
        ),
        |kind: &str| match kind {
            "text" => NodeTest::Kind(KindTest::Text),
            "comment" => NodeTest::Kind(KindTest::Comment),
            "processing-instruction" => NodeTest::Kind(KindTest::ProcessingInstruction),
            _ => NodeTest::Kind(KindTest::Node),
        },
    )
    .parse(input)
}

pub fn node_test(input: &str) -> IResult<&str, NodeTest> {
    alt((
        kind_test,
        map(char('*'), |_| NodeTest::Wildcard),
        map(qname, NodeTest::Name),
    ))
    .parse(input)
}

fn axis_specifier(input: &str) -> IResult<&str, Axis> {
    map(
        terminated(
            alt((
                tag("child"),
                tag("attribute"),
                tag("descendant-or-self"),
                tag("descendant"),
                tag("ancestor"),
                tag("following-sibling"),
                tag("following"),
                tag("preceding-sibling"),
                tag("preceding"),
                tag("parent"),
                tag("self"),
            )),
            tag("::"),
        ),
        |name: &str| match name {
            "attribute" => Axis::Attribute,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "descendant" => Axis::Descendant,
            "ancestor" => Axis::Ancestor,
            "following-sibling" => Axis::FollowingSibling,
            "following" => Axis::Following,
            "preceding-sibling" => Axis::PrecedingSibling,
            "preceding" => Axis::Preceding,
            "parent" => Axis::Parent,
            "self" => Axis::SelfAxis,
            _ => Axis::Child,
        },
    )
    .parse(input)
}

fn predicate(input: &str) -> IResult<&str, Expr> {
    delimited(ws(char('[')), expr, ws(char(']'))).parse(input)
}

fn step(input: &str) -> IResult<&str, Step> {
    let (rest, (axis, test)) = alt((
        map(tag(".."), |_| (Axis::Parent, NodeTest::Kind(KindTest::Node))),
        map(char('.'), |_| (Axis::SelfAxis, NodeTest::Kind(KindTest::Node))),
        map(preceded(char('@'), node_test), |t| (Axis::Attribute, t)),
        map(pair(opt(axis_specifier), node_test), |(axis, t)| {
            (axis.unwrap_or(Axis::Child), t)
        }),
    ))
    .parse(input)?;
    let (rest, predicates) = many0(predicate).parse(rest)?;
    Ok((
        rest,
        Step {
            axis,
            test,
            predicates,
        },
    ))
}

fn relative_steps(input: &str) -> IResult<&str, Vec<Step>> {
    let (rest, first) = step(input)?;
    let (rest, tail) = many0(pair(alt((tag("//"), tag("/"))), step)).parse(rest)?;
    let mut steps = vec![first];
    for (sep, next) in tail {
        if sep == "//" {
            steps.push(Step::any_descendant());
        }
        steps.push(next);
    }
    Ok((rest, steps))
}

fn location_path(input: &str) -> IResult<&str, LocationPath> {
    let (rest, lead) = opt(alt((tag("//"), tag("/")))).parse(input)?;
    match lead {
        Some("//") => {
            let (rest, mut steps) = relative_steps(rest)?;
            steps.insert(0, Step::any_descendant());
            Ok((
                rest,
                LocationPath {
                    start: None,
                    absolute: true,
                    steps,
                },
            ))
        }
        Some(_) => {
            // `/` alone selects the root; further steps are optional.
            let (rest, steps) = opt(relative_steps).parse(rest)?;
            Ok((
                rest,
                LocationPath {
                    start: None,
                    absolute: true,
                    steps: steps.unwrap_or_default(),
                },
            ))
        }
        None => {
            let (rest, steps) = relative_steps(input)?;
            Ok((
                rest,
                LocationPath {
                    start: None,
                    absolute: false,
                    steps,
                },
            ))
        }
    }
}

// --- Function calls ---

fn function_call(input: &str) -> IResult<&str, Expr> {
    let (rest, name) = qname(input)?;
    // Kind tests look like calls; they belong to the step parser.
    if matches!(
        name.as_str(),
        "text" | "node" | "comment" | "processing-instruction"
    ) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }
    let (rest, args) = delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), expr),
        char(')'),
    )
    .parse(rest)?;
    Ok((rest, Expr::Call { name, args }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_step(name: &str) -> Step {
        Step {
            axis: Axis::Child,
            test: NodeTest::Name(name.to_string()),
            predicates: vec![],
        }
    }

    fn path(steps: Vec<Step>) -> Expr {
        Expr::Path(LocationPath {
            start: None,
            absolute: false,
            steps,
        })
    }

    #[test]
    fn simple_relative_path() {
        let parsed = parse_expression("foo/bar").unwrap();
        assert_eq!(parsed, path(vec![name_step("foo"), name_step("bar")]));
    }

    #[test]
    fn absolute_and_root_paths() {
        let parsed = parse_expression("/").unwrap();
        assert_eq!(
            parsed,
            Expr::Path(LocationPath {
                start: None,
                absolute: true,
                steps: vec![]
            })
        );
        let parsed = parse_expression("/doc/item").unwrap();
        if let Expr::Path(p) = parsed {
            assert!(p.absolute);
            assert_eq!(p.steps.len(), 2);
        } else {
            panic!("expected a path");
        }
    }

    #[test]
    fn double_slash_inserts_descendant_step() {
        let parsed = parse_expression("//item").unwrap();
        assert_eq!(
            parsed,
            Expr::Path(LocationPath {
                start: None,
                absolute: true,
                steps: vec![Step::any_descendant(), name_step("item")],
            })
        );
    }

    #[test]
    fn dot_and_dotdot_steps() {
        let parsed = parse_expression(".").unwrap();
        if let Expr::Path(p) = parsed {
            assert_eq!(p.steps[0].axis, Axis::SelfAxis);
            assert_eq!(p.steps[0].test, NodeTest::Kind(KindTest::Node));
        } else {
            panic!("expected a path for '.'");
        }
        let parsed = parse_expression("../name").unwrap();
        if let Expr::Path(p) = parsed {
            assert_eq!(p.steps[0].axis, Axis::Parent);
            assert_eq!(p.steps[1].test, NodeTest::Name("name".to_string()));
        } else {
            panic!("expected a path for '../name'");
        }
    }

    #[test]
    fn attribute_and_axis_steps() {
        let parsed = parse_expression("@id").unwrap();
        if let Expr::Path(p) = parsed {
            assert_eq!(p.steps[0].axis, Axis::Attribute);
        } else {
            panic!("expected a path");
        }
        let parsed = parse_expression("preceding-sibling::item").unwrap();
        if let Expr::Path(p) = parsed {
            assert_eq!(p.steps[0].axis, Axis::PrecedingSibling);
        } else {
            panic!("expected a path");
        }
    }

    #[test]
    fn path_rooted_at_variable() {
        let parsed = parse_expression("$node/name").unwrap();
        assert_eq!(
            parsed,
            Expr::Path(LocationPath {
                start: Some(Box::new(Expr::Var("node".to_string()))),
                absolute: false,
                steps: vec![name_step("name")],
            })
        );
    }

    #[test]
    fn predicates_attach_to_their_step() {
        let parsed = parse_expression("item[@key = 'a'][2]").unwrap();
        if let Expr::Path(p) = parsed {
            assert_eq!(p.steps[0].predicates.len(), 2);
            assert_eq!(p.steps[0].predicates[1], Expr::Number(2.0));
        } else {
            panic!("expected a path");
        }
    }

    #[test]
    fn function_call_with_positional_test() {
        let parsed = parse_expression("item[position()=1]").unwrap();
        if let Expr::Path(p) = parsed {
            assert!(matches!(
                p.steps[0].predicates[0],
                Expr::Binary {
                    op: BinaryOp::Eq,
                    ..
                }
            ));
        } else {
            panic!("expected a path");
        }
    }

    #[test]
    fn kind_tests_are_not_function_calls() {
        let parsed = parse_expression("foo/text()").unwrap();
        if let Expr::Path(p) = parsed {
            assert_eq!(p.steps[1].test, NodeTest::Kind(KindTest::Text));
        } else {
            panic!("expected a path");
        }
    }

    #[test]
    fn operator_precedence() {
        let parsed = parse_expression("1 + 2 * 3").unwrap();
        assert_eq!(
            parsed,
            Expr::binary(
                Expr::Number(1.0),
                BinaryOp::Add,
                Expr::binary(Expr::Number(2.0), BinaryOp::Mul, Expr::Number(3.0)),
            )
        );
        let parsed = parse_expression("a = b or c = d and e = f").unwrap();
        assert!(matches!(
            parsed,
            Expr::Binary {
                op: BinaryOp::Or,
                ..
            }
        ));
    }

    #[test]
    fn unary_minus_binds_tighter_than_subtraction() {
        let parsed = parse_expression("10 - -5").unwrap();
        if let Expr::Binary { op, rhs, .. } = parsed {
            assert_eq!(op, BinaryOp::Sub);
            assert_eq!(*rhs, Expr::Negate(Box::new(Expr::Number(5.0))));
        } else {
            panic!("expected a subtraction");
        }
    }

    #[test]
    fn named_operators_require_word_boundaries() {
        // `order` must stay one name, not parse as `or` + `der`.
        let parsed = parse_expression("order").unwrap();
        assert_eq!(parsed, path(vec![name_step("order")]));
        let parsed = parse_expression("dividend mod divisor").unwrap();
        assert!(matches!(
            parsed,
            Expr::Binary {
                op: BinaryOp::Mod,
                ..
            }
        ));
    }

    #[test]
    fn names_with_number_like_prefixes() {
        // `info` must not be eaten by a float parser accepting `inf`.
        let parsed = parse_expression("info").unwrap();
        assert_eq!(parsed, path(vec![name_step("info")]));
    }

    #[test]
    fn union_of_paths() {
        let parsed = parse_expression("para|note").unwrap();
        assert!(matches!(
            parsed,
            Expr::Binary {
                op: BinaryOp::Union,
                ..
            }
        ));
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(parse_expression("foo)").is_err());
        assert!(parse_expression("").is_err());
    }
}
