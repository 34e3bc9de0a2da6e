//! Path queries over the node arena.
//!
//! `include@xpath` filters and `copy@path` directives address nodes with an
//! XPath 1.0 location path. This module implements the subset those files
//! use:
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `/a/b`, `a/b`, `./a` | absolute and relative child steps |
//! | `..` | parent (the document node above the root element included) |
//! | `//a`, `a//b` | descendant-or-self shorthand |
//! | `*`, `node()`, `comment()` | element, any node, comment tests |
//! | `axis::test` | `child`, `descendant`, `descendant-or-self`, `parent`, `ancestor`, `ancestor-or-self`, `self`, `following-sibling`, `preceding-sibling` |
//! | `[2]`, `[last()]` | position within the step, in axis order |
//! | `[@a]`, `[@a='v']`, `[@a!='v']` | attribute predicates |
//! | `[child]` | has a child element named `child` |
//! | `p1 \| p2` | union |
//!
//! Results are deduplicated and returned in document order.

use crate::tree::{Arena, NodeId};

/// A parsed path query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    paths: Vec<LocationPath>,
}

#[derive(Debug, Clone, PartialEq)]
struct LocationPath {
    absolute: bool,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Predicate>,
}

impl Step {
    fn descendant_or_self() -> Self {
        Self {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::Any,
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    AncestorOrSelf,
    SelfAxis,
    FollowingSibling,
    PrecedingSibling,
}

impl Axis {
    fn from_name(name: &str) -> Result<Self, String> {
        Ok(match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "self" => Axis::SelfAxis,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            other => return Err(format!("unsupported axis '{other}'")),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum NodeTest {
    Any,
    Element,
    Named(String),
    Comment,
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Position(usize),
    Last,
    HasAttr(String),
    AttrEq(String, String),
    AttrNe(String, String),
    HasChild(String),
}

/// A point in the tree during evaluation. `Document` stands for the virtual
/// node above a root element, which is where absolute paths start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Item {
    Document(NodeId),
    Node(NodeId),
}

impl Item {
    fn node(self) -> Option<NodeId> {
        match self {
            Item::Node(id) => Some(id),
            Item::Document(_) => None,
        }
    }

    fn order_key(self, arena: &Arena) -> Vec<usize> {
        match self {
            Item::Document(_) => Vec::new(),
            Item::Node(id) => arena.order_key(id),
        }
    }
}

impl Query {
    /// Parse a query. The error is a human-readable reason.
    pub fn parse(source: &str) -> Result<Self, String> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err("empty query".into());
        }
        let mut parser = Parser { tokens, pos: 0 };
        let query = parser.query()?;
        if let Some(tok) = parser.peek() {
            return Err(format!("unexpected {tok:?} at token {}", parser.pos + 1));
        }
        Ok(query)
    }

    /// Evaluate the query with `context` as the context node.
    pub fn select(&self, arena: &Arena, context: NodeId) -> Vec<NodeId> {
        let mut found: Vec<NodeId> = self
            .paths
            .iter()
            .flat_map(|p| p.evaluate(arena, context))
            .collect();
        found.sort_by_cached_key(|&n| arena.order_key(n));
        found.dedup();
        found
    }
}

impl LocationPath {
    fn evaluate(&self, arena: &Arena, context: NodeId) -> Vec<NodeId> {
        let start = if self.absolute {
            Item::Document(arena.tree_root(context))
        } else {
            Item::Node(context)
        };

        let mut current = vec![start];
        for step in &self.steps {
            let mut next = Vec::new();
            for &item in &current {
                let mut matched: Vec<Item> = walk(arena, item, step.axis)
                    .into_iter()
                    .filter(|&c| test_matches(arena, c, &step.test))
                    .collect();
                for predicate in &step.predicates {
                    matched = apply_predicate(arena, matched, predicate);
                }
                next.extend(matched);
            }
            next.sort_by_cached_key(|&i| i.order_key(arena));
            next.dedup();
            current = next;
        }
        current.into_iter().filter_map(Item::node).collect()
    }
}

/// Nodes reachable from `item` along `axis`, in axis order (nearest first
/// for the reverse axes).
fn walk(arena: &Arena, item: Item, axis: Axis) -> Vec<Item> {
    let nodes = |ids: Vec<NodeId>| ids.into_iter().map(Item::Node).collect::<Vec<_>>();
    match item {
        Item::Document(root) => match axis {
            Axis::Child => vec![Item::Node(root)],
            Axis::Descendant => nodes(arena.subtree(root)),
            Axis::DescendantOrSelf => {
                let mut out = vec![item];
                out.extend(nodes(arena.subtree(root)));
                out
            }
            Axis::SelfAxis | Axis::AncestorOrSelf => vec![item],
            Axis::Parent | Axis::Ancestor | Axis::FollowingSibling | Axis::PrecedingSibling => {
                Vec::new()
            }
        },
        Item::Node(id) => {
            let above = || match arena.node(id).parent() {
                Some(_) => Vec::new(),
                None => vec![Item::Document(id)],
            };
            match axis {
                Axis::Child => nodes(arena.node(id).children().to_vec()),
                Axis::Descendant => nodes(arena.descendants(id)),
                Axis::DescendantOrSelf => nodes(arena.subtree(id)),
                Axis::Parent => match arena.node(id).parent() {
                    Some(parent) => vec![Item::Node(parent)],
                    None => above(),
                },
                Axis::Ancestor | Axis::AncestorOrSelf => {
                    let mut out = Vec::new();
                    if axis == Axis::AncestorOrSelf {
                        out.push(item);
                    }
                    out.extend(nodes(arena.ancestors(id)));
                    out.push(Item::Document(arena.tree_root(id)));
                    out
                }
                Axis::SelfAxis => vec![item],
                Axis::FollowingSibling => nodes(arena.following_siblings(id)),
                Axis::PrecedingSibling => nodes(arena.preceding_siblings(id)),
            }
        }
    }
}

fn test_matches(arena: &Arena, item: Item, test: &NodeTest) -> bool {
    match (item, test) {
        (_, NodeTest::Any) => true,
        (Item::Document(_), _) => false,
        (Item::Node(id), NodeTest::Element) => !arena.node(id).tag.is_comment(),
        (Item::Node(id), NodeTest::Comment) => arena.node(id).tag.is_comment(),
        (Item::Node(id), NodeTest::Named(name)) => {
            let tag = &arena.node(id).tag;
            !tag.is_comment() && tag.name() == name
        }
    }
}

fn apply_predicate(arena: &Arena, items: Vec<Item>, predicate: &Predicate) -> Vec<Item> {
    let count = items.len();
    items
        .into_iter()
        .enumerate()
        .filter(|&(i, item)| match predicate {
            Predicate::Position(n) => i + 1 == *n,
            Predicate::Last => i + 1 == count,
            Predicate::HasAttr(key) => attr(arena, item, key).is_some(),
            Predicate::AttrEq(key, v) => attr(arena, item, key) == Some(v.as_str()),
            Predicate::AttrNe(key, v) => {
                attr(arena, item, key).is_some_and(|found| found != v.as_str())
            }
            Predicate::HasChild(name) => item.node().is_some_and(|id| {
                arena.node(id).children().iter().any(|&c| {
                    let tag = &arena.node(c).tag;
                    !tag.is_comment() && tag.name() == name
                })
            }),
        })
        .map(|(_, item)| item)
        .collect()
}

fn attr<'a>(arena: &'a Arena, item: Item, key: &str) -> Option<&'a str> {
    item.node().and_then(|id| arena.node(id).attr(key))
}

// ---------------------------------------------------------------------------
// Lexing and parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    Dot,
    DotDot,
    Star,
    At,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Eq,
    NotEq,
    Pipe,
    Axis(String),
    Name(String),
    Literal(String),
    Number(usize),
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '/' if next == Some('/') => {
                tokens.push(Token::DoubleSlash);
                i += 2;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '.' if next == Some('.') => {
                tokens.push(Token::DotDot);
                i += 2;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            '*' | '@' | '[' | ']' | '(' | ')' | '=' | '|' => {
                tokens.push(match c {
                    '*' => Token::Star,
                    '@' => Token::At,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '=' => Token::Eq,
                    _ => Token::Pipe,
                });
                i += 1;
            }
            '\'' | '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&q| q == c)
                    .ok_or_else(|| "unterminated string literal".to_string())?;
                tokens.push(Token::Literal(chars[i + 1..i + 1 + end].iter().collect()));
                i += end + 2;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let digits: String = chars[start..i].iter().collect();
                let n = digits
                    .parse()
                    .map_err(|_| format!("number '{digits}' is out of range"))?;
                tokens.push(Token::Number(n));
            }
            c if is_name_start(c) => {
                let start = i;
                while i < chars.len() && is_name_char(chars[i]) {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                if chars.get(i) == Some(&':') && chars.get(i + 1) == Some(&':') {
                    tokens.push(Token::Axis(name));
                    i += 2;
                } else {
                    tokens.push(Token::Name(name));
                }
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), String> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(format!("expected {expected:?}, found {:?}", self.peek()))
        }
    }

    fn query(&mut self) -> Result<Query, String> {
        let mut paths = vec![self.location_path()?];
        while self.eat(&Token::Pipe) {
            paths.push(self.location_path()?);
        }
        Ok(Query { paths })
    }

    fn at_step_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Dot | Token::DotDot | Token::Star | Token::Name(_) | Token::Axis(_))
        )
    }

    fn location_path(&mut self) -> Result<LocationPath, String> {
        let mut steps = Vec::new();
        let absolute = match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                if !self.at_step_start() {
                    return Ok(LocationPath {
                        absolute: true,
                        steps,
                    });
                }
                true
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                steps.push(Step::descendant_or_self());
                true
            }
            _ => false,
        };

        steps.push(self.step()?);
        loop {
            match self.peek() {
                Some(Token::Slash) => {
                    self.pos += 1;
                    steps.push(self.step()?);
                }
                Some(Token::DoubleSlash) => {
                    self.pos += 1;
                    steps.push(Step::descendant_or_self());
                    steps.push(self.step()?);
                }
                _ => break,
            }
        }
        Ok(LocationPath { absolute, steps })
    }

    fn step(&mut self) -> Result<Step, String> {
        let (axis, test) = match self.peek() {
            Some(Token::Dot) => {
                self.pos += 1;
                (Axis::SelfAxis, NodeTest::Any)
            }
            Some(Token::DotDot) => {
                self.pos += 1;
                (Axis::Parent, NodeTest::Any)
            }
            Some(Token::Axis(name)) => {
                let axis = Axis::from_name(name)?;
                self.pos += 1;
                (axis, self.node_test()?)
            }
            Some(_) => (Axis::Child, self.node_test()?),
            None => return Err("expected a location step".into()),
        };
        let predicates = self.predicates()?;
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn node_test(&mut self) -> Result<NodeTest, String> {
        match self.bump() {
            Some(Token::Star) => Ok(NodeTest::Element),
            Some(Token::Name(name)) => {
                if self.eat(&Token::LParen) {
                    self.expect(&Token::RParen)?;
                    match name.as_str() {
                        "node" => Ok(NodeTest::Any),
                        "comment" => Ok(NodeTest::Comment),
                        other => Err(format!("unsupported node test '{other}()'")),
                    }
                } else {
                    Ok(NodeTest::Named(name))
                }
            }
            other => Err(format!("expected a node test, found {other:?}")),
        }
    }

    fn predicates(&mut self) -> Result<Vec<Predicate>, String> {
        let mut out = Vec::new();
        while self.eat(&Token::LBracket) {
            let predicate = match self.bump() {
                Some(Token::Number(0)) => return Err("positions start at 1".into()),
                Some(Token::Number(n)) => Predicate::Position(n),
                Some(Token::Name(name)) if name == "last" => {
                    self.expect(&Token::LParen)?;
                    self.expect(&Token::RParen)?;
                    Predicate::Last
                }
                Some(Token::Name(child)) => Predicate::HasChild(child),
                Some(Token::At) => {
                    let Some(Token::Name(key)) = self.bump() else {
                        return Err("expected an attribute name after '@'".into());
                    };
                    if self.eat(&Token::Eq) {
                        Predicate::AttrEq(key, self.literal()?)
                    } else if self.eat(&Token::NotEq) {
                        Predicate::AttrNe(key, self.literal()?)
                    } else {
                        Predicate::HasAttr(key)
                    }
                }
                other => return Err(format!("unsupported predicate starting with {other:?}")),
            };
            self.expect(&Token::RBracket)?;
            out.push(predicate);
        }
        Ok(out)
    }

    fn literal(&mut self) -> Result<String, String> {
        match self.bump() {
            Some(Token::Literal(s)) => Ok(s),
            Some(Token::Number(n)) => Ok(n.to_string()),
            other => Err(format!("expected a literal, found {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::parse;

    const DOC: &str = r#"<config name="root">
        <group name="g1">
            <option name="a"/>
            <option name="b" type="int"/>
            <!-- templates -->
        </group>
        <group name="g2">
            <option name="c"/>
            <copy path="../../group[@name='g1']/option"/>
        </group>
    </config>"#;

    fn names(arena: &Arena, ids: &[NodeId]) -> Vec<String> {
        ids.iter()
            .map(|&id| {
                let node = arena.node(id);
                node.attr("name")
                    .map(str::to_string)
                    .unwrap_or_else(|| node.tag.name().to_string())
            })
            .collect()
    }

    fn run(query: &str, from: &str) -> Vec<String> {
        let (arena, root) = parse(DOC);
        let context = arena
            .subtree(root)
            .into_iter()
            .find(|&n| {
                let node = arena.node(n);
                node.attr("name") == Some(from) || node.tag.name() == from
            })
            .unwrap();
        let found = Query::parse(query).unwrap().select(&arena, context);
        names(&arena, &found)
    }

    #[test]
    fn relative_child_steps() {
        assert_eq!(run("group/option", "root"), vec!["a", "b", "c"]);
        assert_eq!(run("./group", "root"), vec!["g1", "g2"]);
    }

    #[test]
    fn parent_and_sibling_navigation() {
        assert_eq!(run("../../group[@name='g1']/option", "copy"), vec!["a", "b"]);
        assert!(run("../group", "copy").is_empty());
        assert_eq!(run("..", "c"), vec!["g2"]);
        assert_eq!(run("following-sibling::*", "c"), vec!["copy"]);
        assert_eq!(run("preceding-sibling::group", "g2"), vec!["g1"]);
    }

    #[test]
    fn absolute_paths_start_above_root() {
        assert_eq!(run("/config", "c"), vec!["root"]);
        assert_eq!(run("/config/group[2]/option", "a"), vec!["c"]);
        assert_eq!(run("/", "a"), Vec::<String>::new());
    }

    #[test]
    fn descendant_shorthand() {
        assert_eq!(run("//option", "c"), vec!["a", "b", "c"]);
        assert_eq!(run("group//option[@type]", "root"), vec!["b"]);
    }

    #[test]
    fn positional_predicates_are_per_step() {
        assert_eq!(run("//option[1]", "root"), vec!["a", "c"]);
        assert_eq!(run("group/option[last()]", "root"), vec!["b", "c"]);
        assert_eq!(run("ancestor::*[1]", "a"), vec!["g1"]);
    }

    #[test]
    fn attribute_and_child_predicates() {
        assert_eq!(run("group[@name!='g1']", "root"), vec!["g2"]);
        assert_eq!(run("group[copy]", "root"), vec!["g2"]);
        assert_eq!(run("//option[@type=\"int\"]", "root"), vec!["b"]);
    }

    #[test]
    fn comments_only_match_comment_tests() {
        assert_eq!(run("group/*", "root").len(), 4);
        assert_eq!(run("group/comment()", "root"), vec!["#comment"]);
        assert_eq!(run("group/node()", "root").len(), 5);
    }

    #[test]
    fn union_is_ordered_and_deduplicated() {
        assert_eq!(
            run("group[2]/option | group[1]/option | //option[@name='a']", "root"),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn self_step_selects_context() {
        assert_eq!(run(".", "g2"), vec!["g2"]);
        assert_eq!(run("self::group", "g2"), vec!["g2"]);
        assert_eq!(run("ancestor-or-self::group", "c"), vec!["g2"]);
    }

    #[test]
    fn invalid_queries_are_rejected() {
        for bad in ["", "group[", "@name", "foo::bar", "a[0]", "a[@x='y]", "text()", "a b"] {
            assert!(Query::parse(bad).is_err(), "query {bad:?} should not parse");
        }
    }
}
