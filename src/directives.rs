use log::trace;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::delimiter::{find_top_level, split_top_level};
use crate::engine::{Estimator, Processor};
use crate::{
    parse_count_prefix, Choice, ChoiceSet, Context, Directive, Error, Estimation, Handler,
    LabelFilter, MatchState, Quantity, Result,
};

fn split_options(body: &str) -> Vec<&str> {
    split_top_level(body, "|", &['<'], &['>'])
}

fn split_pair(body: &str) -> Vec<&str> {
    split_top_level(body, "||", &['<'], &['>'])
}

fn split_wildcard_body(body: &str) -> (&str, Option<&str>) {
    match find_top_level(body, 0, ':', &['<'], &['>']) {
        Some(at) => (&body[..at], Some(&body[at + 1..])),
        None => (body, None),
    }
}

// `name[,flag]`, with the flag lowercased
fn name_and_flag(prefix: &str) -> (String, String) {
    match prefix.split_once(',') {
        Some((name, flag)) => (name.trim().to_string(), flag.trim().to_lowercase()),
        None => (prefix.trim().to_string(), String::new()),
    }
}

fn require_name(name: &str, directive: &Directive) -> Result<()> {
    if name.is_empty() {
        Err(Error::UsageError(format!("{} needs a name", directive.name())))
    } else {
        Ok(())
    }
}

fn emits(flag: &str) -> bool {
    !matches!(flag, "false" | "0" | "no")
}

/// Upper bound on the number of options one directive may draw
pub(crate) const MAX_DRAWS: usize = 1000;

fn draw(
    context: &mut Context<'_>,
    choices: Vec<Choice>,
    quantity: Quantity,
    separator: &str,
) -> Result<String> {
    let mut eligible = Vec::with_capacity(choices.len());
    for choice in choices {
        let allowed = match &choice.guard {
            Some(guard) => context.is_true(guard),
            None => true,
        };
        if allowed {
            eligible.push(choice);
        }
    }
    let mut set = ChoiceSet::new(eligible);
    if set.is_empty() {
        return Ok(String::new());
    }
    let mut count = quantity.resolve(set.len(), context.rng());
    if count > MAX_DRAWS {
        context.warn(format!("draw count {} was capped at {}", count, MAX_DRAWS));
        count = MAX_DRAWS;
    }
    let selection = context.engine().selection();
    let drawn = set.draw_many(count, selection, context.rng());
    trace!("drew {} choices, {} refills", drawn.len(), set.refills());
    let mut parts = Vec::with_capacity(drawn.len());
    for choice in drawn {
        parts.push(context.expand_text(&choice.value)?);
    }
    Ok(parts.join(separator))
}

fn random(d: &Directive, context: &mut Context<'_>) -> Result<String> {
    let (quantity, separator) = parse_count_prefix(d.prefix());
    let choices = Choice::parse_all(split_options(d.body()));
    draw(context, choices, quantity, &separator)
}

fn wildcard(d: &Directive, context: &mut Context<'_>) -> Result<String> {
    let (quantity, separator) = parse_count_prefix(d.prefix());
    let (name, filter) = split_wildcard_body(d.body());
    let name = context.expand_text(name)?;
    let name = name.trim();
    let filter = match filter {
        Some(filter) => LabelFilter::parse(&context.expand_text(filter)?),
        None => LabelFilter::default(),
    };
    let lines = context
        .engine()
        .wildcards()
        .options(name)
        .ok_or_else(|| Error::MissingWildcard(name.to_string()))?;
    let choices = Choice::parse_all(lines)
        .into_iter()
        .filter(|c| filter.matches(c))
        .collect();
    draw(context, choices, quantity, &separator)
}

fn from_to(d: &Directive, context: &mut Context<'_>) -> Result<String> {
    match split_pair(d.body()).as_slice() {
        [from, to] => {
            let from = context.expand_text(from)?;
            let to = context.expand_text(to)?;
            let step = context.expand_text(d.prefix())?;
            Ok(format!("[{}:{}:{}]", from, to, step.trim()))
        }
        _ => Err(Error::UsageError(format!(
            "fromto expects 'from||to', got '{}'",
            d.body()
        ))),
    }
}

fn alternate(d: &Directive, context: &mut Context<'_>) -> Result<String> {
    let parts = split_pair(d.body())
        .into_iter()
        .map(|part| context.expand_text(part))
        .collect::<Result<Vec<String>>>()?;
    Ok(format!("[{}]", parts.join("|")))
}

fn set_variable(d: &Directive, context: &mut Context<'_>) -> Result<String> {
    let (name, flag) = name_and_flag(d.prefix());
    require_name(&name, d)?;
    let value = context.expand_text(d.body())?;
    context.scope_mut().set_variable(name, value.clone());
    Ok(if emits(&flag) { value } else { String::new() })
}

fn set_macro(d: &Directive, context: &mut Context<'_>) -> Result<String> {
    let (name, flag) = name_and_flag(d.prefix());
    require_name(&name, d)?;
    context.scope_mut().set_macro(name, d.body());
    if emits(&flag) {
        context.expand_text(d.body())
    } else {
        Ok(String::new())
    }
}

fn variable(d: &Directive, context: &mut Context<'_>) -> Result<String> {
    let value = context.scope().variable(d.body().trim()).unwrap_or_default();
    Ok(value.to_string())
}

fn read_macro(d: &Directive, context: &mut Context<'_>) -> Result<String> {
    match context.scope().macro_text(d.body().trim()).map(str::to_string) {
        Some(text) => context.expand_text(&text),
        None => Ok(String::new()),
    }
}

fn add_variable(d: &Directive, context: &mut Context<'_>) -> Result<String> {
    let (name, mode) = name_and_flag(d.prefix());
    require_name(&name, d)?;
    let data = context.expand_text(d.body())?;
    let current = context.scope().variable(&name).unwrap_or_default();
    let combined = if mode == "prepend" {
        format!("{}{}", data, current)
    } else {
        format!("{}{}", current, data)
    };
    context.scope_mut().set_variable(name, combined);
    Ok(String::new())
}

fn add_macro(d: &Directive, context: &mut Context<'_>) -> Result<String> {
    let (name, mode) = name_and_flag(d.prefix());
    require_name(&name, d)?;
    let current = context.scope().macro_text(&name).unwrap_or_default();
    let combined = if mode == "prepend" {
        format!("{}{}", d.body(), current)
    } else {
        format!("{}{}", current, d.body())
    };
    context.scope_mut().set_macro(name, combined);
    Ok(String::new())
}

fn push_macro(d: &Directive, context: &mut Context<'_>) -> Result<String> {
    let name = d.prefix().trim();
    require_name(name, d)?;
    let value = context.expand_text(d.body())?;
    context.scope_mut().push_macro(name.to_string(), value);
    Ok(String::new())
}

fn pop_macro(d: &Directive, context: &mut Context<'_>) -> Result<String> {
    let name = if d.body().trim().is_empty() {
        d.prefix().trim()
    } else {
        d.body().trim()
    };
    require_name(name, d)?;
    context.scope_mut().pop_macro(name);
    Ok(String::new())
}

fn negative(d: &Directive, context: &mut Context<'_>) -> Result<String> {
    let prepend = d.prefix().trim().eq_ignore_ascii_case("prepend");
    let data = context.expand_text(d.body())?;
    context.add_negative(&data, prepend);
    Ok(String::new())
}

fn comment(_: &Directive, _: &mut Context<'_>) -> Result<String> {
    Ok(String::new())
}

fn match_block(d: &Directive, context: &mut Context<'_>) -> Result<String> {
    context.with_match(d.body())
}

fn case(d: &Directive, context: &mut Context<'_>) -> Result<String> {
    match context.match_state() {
        MatchState::None => Err(Error::UsageError(
            "a wccase tag must be inside a wcmatch tag".into(),
        )),
        MatchState::Closed => Ok(String::new()),
        MatchState::Open => {
            let condition = d.prefix().trim();
            if condition.is_empty() {
                context.set_match_state(MatchState::Closed);
                context.expand_text(d.body())
            } else if context.is_true(condition) {
                // a case that fired on its condition drops surrounding whitespace
                context.set_match_state(MatchState::Closed);
                context.expand_text(d.body().trim())
            } else {
                Ok(String::new())
            }
        }
    }
}

fn longest_repeated(options: Vec<String>, quantity: Quantity, separator: &str) -> String {
    let count = quantity
        .upper
        .unwrap_or_else(|| options.len().saturating_sub(1))
        .max(quantity.lower)
        .min(MAX_DRAWS);
    let longest = options
        .into_iter()
        .max_by_key(|o| o.chars().count())
        .unwrap_or_default();
    vec![longest; count].join(separator)
}

fn estimate_random(d: &Directive, estimation: &mut Estimation<'_>) -> String {
    let (quantity, separator) = parse_count_prefix(d.prefix());
    let options = split_options(d.body())
        .into_iter()
        .map(|o| estimation.estimate_text(&Choice::parse(o).value))
        .collect();
    longest_repeated(options, quantity, &separator)
}

fn estimate_wildcard(d: &Directive, estimation: &mut Estimation<'_>) -> String {
    let (quantity, separator) = parse_count_prefix(d.prefix());
    let (name, _) = split_wildcard_body(d.body());
    let name = estimation.estimate_text(name);
    let lines = match estimation.engine().wildcards().options(name.trim()) {
        Some(lines) => lines,
        None => return String::new(),
    };
    let options = lines
        .iter()
        .map(|l| estimation.estimate_text(&Choice::parse(l).value))
        .collect();
    longest_repeated(options, quantity, &separator)
}

fn estimate_from_to(d: &Directive, estimation: &mut Estimation<'_>) -> String {
    match split_pair(d.body()).as_slice() {
        [from, to] => format!(
            "[{}:{}:{}]",
            estimation.estimate_text(from),
            estimation.estimate_text(to),
            estimation.estimate_text(d.prefix())
        ),
        _ => String::new(),
    }
}

fn estimate_alternate(d: &Directive, estimation: &mut Estimation<'_>) -> String {
    let parts: Vec<String> = split_pair(d.body())
        .into_iter()
        .map(|part| estimation.estimate_text(part))
        .collect();
    format!("[{}]", parts.join("|"))
}

fn estimate_assignment(d: &Directive, estimation: &mut Estimation<'_>) -> String {
    let (_, flag) = name_and_flag(d.prefix());
    if emits(&flag) {
        estimation.estimate_text(d.body())
    } else {
        String::new()
    }
}

fn estimate_macro(d: &Directive, _: &mut Estimation<'_>) -> String {
    // macro and variable values are unknown until expansion
    format!("<{}>", d.body().trim())
}

fn estimate_match(d: &Directive, estimation: &mut Estimation<'_>) -> String {
    estimation.with_match(d.body())
}

fn estimate_case(d: &Directive, estimation: &mut Estimation<'_>) -> String {
    let case = estimation.estimate_text(d.body());
    estimation.record_case(case)
}

fn nothing(_: &Directive, _: &mut Estimation<'_>) -> String {
    String::new()
}

pub(crate) fn get_default_directives() -> BTreeMap<String, Handler> {
    let mut directives = BTreeMap::new();
    let mut add = |name: &str, processor: Processor, estimator: Estimator| {
        directives.insert(name.to_string(), Handler::new(processor).with_estimator(estimator));
    };
    add("random", Rc::new(random), Rc::new(estimate_random));
    add("wcwildcard", Rc::new(wildcard), Rc::new(estimate_wildcard));
    add("fromto", Rc::new(from_to), Rc::new(estimate_from_to));
    add("alternate", Rc::new(alternate), Rc::new(estimate_alternate));
    add("setvar", Rc::new(set_variable), Rc::new(estimate_assignment));
    add("setmacro", Rc::new(set_macro), Rc::new(estimate_assignment));
    add("var", Rc::new(variable), Rc::new(estimate_macro));
    add("macro", Rc::new(read_macro), Rc::new(estimate_macro));
    add("wcmacro", Rc::new(read_macro), Rc::new(estimate_macro));
    add("wcaddvar", Rc::new(add_variable), Rc::new(nothing));
    add("wcaddmacro", Rc::new(add_macro), Rc::new(nothing));
    add("wcpushmacro", Rc::new(push_macro), Rc::new(nothing));
    add("wcpopmacro", Rc::new(pop_macro), Rc::new(nothing));
    add("wcnegative", Rc::new(negative), Rc::new(nothing));
    add("comment", Rc::new(comment), Rc::new(nothing));
    add("wcmatch", Rc::new(match_block), Rc::new(estimate_match));
    add("wccase", Rc::new(case), Rc::new(estimate_case));
    directives
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Engine, Selection, WildcardSet};
    use maplit::hashmap;
    use rand::{rngs::StdRng, SeedableRng};

    fn expand(engine: &Engine, text: &str) -> Result<String> {
        Ok(engine.expand(text, &mut StdRng::seed_from_u64(11))?.text)
    }

    fn colors() -> Engine {
        Engine::new().with_wildcards(WildcardSet::from_map(hashmap! {
            "colors" => vec!["(warm)::red", "(cold)::blue", "(warm,bright)::yellow", "# note", ""],
            "nested" => vec!["<wcwildcard:colors:cold> sky"],
        }))
    }

    #[test]
    fn random_draws_distinct_choices() -> Result<()> {
        let engine = Engine::new();
        let out = expand(&engine, "<random[3,]:a|b|c>")?;
        let mut parts: Vec<&str> = out.split(", ").collect();
        parts.sort();
        assert_eq!(parts, vec!["a", "b", "c"]);
        assert_eq!(expand(&engine, "<random[2, and ]:x|x>")?, "x and x");
        assert_eq!(expand(&engine, "<random:0::never|always>")?, "always");
        assert_eq!(expand(&engine, "<random:0::never>")?, "");
        Ok(())
    }

    #[test]
    fn random_respects_guards() -> Result<()> {
        let engine = Engine::new();
        let text = "<setvar[mood,false]:calm><random:if mood eq 'calm'::still|if mood eq 'angry'::loud>";
        for _ in 0..5 {
            assert_eq!(expand(&engine, text)?, "still");
        }
        Ok(())
    }

    #[test]
    fn index_selection() -> Result<()> {
        let engine = Engine::new().with_selection(Selection::Index(2));
        assert_eq!(expand(&engine, "<random:a|b|c>")?, "c");
        Ok(())
    }

    #[test]
    fn wildcards_and_filters() -> Result<()> {
        let engine = colors();
        assert_eq!(expand(&engine, "<wcwildcard:colors:cold>")?, "blue");
        assert_eq!(expand(&engine, "<wcwildcard:colors:2>")?, "blue");
        assert_eq!(expand(&engine, "<wcwildcard:colors:warm+!bright>")?, "red");
        assert_eq!(expand(&engine, "<wcwildcard:COLORS:cold>")?, "blue");
        assert_eq!(expand(&engine, "<wcwildcard:nested>")?, "blue sky");
        let all = expand(&engine, "<wcwildcard[3,]:colors>")?;
        assert_eq!(all.split(", ").count(), 3);
        Ok(())
    }

    #[test]
    fn filters_from_macros() -> Result<()> {
        let engine = colors();
        let text = "<wcpushmacro[wcfilter_colors]:cold>\
                    <wcwildcard:colors:<wcmacro:wcfilter_colors>>\
                    <wcpopmacro:wcfilter_colors>";
        assert_eq!(expand(&engine, text)?, "blue");
        Ok(())
    }

    #[test]
    fn missing_wildcard_warns() -> Result<()> {
        let engine = Engine::new();
        let expansion = engine.expand("a<wcwildcard:nope>b", &mut StdRng::seed_from_u64(0))?;
        assert_eq!(expansion.text, "ab");
        assert_eq!(expansion.warnings, vec!["Warning: <wcwildcard> failed: missing wildcard: nope"]);
        Ok(())
    }

    #[test]
    fn open_ended_wildcard_count() -> Result<()> {
        let engine = colors();
        for _ in 0..5 {
            let out = engine.expand("<wcwildcard[1-,]:colors>", &mut rand::thread_rng())?;
            let n = out.text.split(", ").count();
            assert!((1..=2).contains(&n));
        }
        Ok(())
    }

    #[test]
    fn from_to_and_alternate() -> Result<()> {
        let engine = Engine::new();
        assert_eq!(expand(&engine, "<fromto[0.5]:cat||dog>")?, "[cat:dog:0.5]");
        assert_eq!(expand(&engine, "<alternate:cat||<random:dog>>")?, "[cat|dog]");
        let expansion = engine.expand("<fromto:cat>", &mut rand::thread_rng())?;
        assert_eq!(expansion.warnings.len(), 1);
        Ok(())
    }

    #[test]
    fn variables_and_macros() -> Result<()> {
        let engine = Engine::new();
        assert_eq!(expand(&engine, "<setvar[a]:x> <var:a>")?, "x x");
        assert_eq!(expand(&engine, "<setvar[a,false]:x><var:a>")?, "x");
        assert_eq!(expand(&engine, "<setmacro[m,false]:<var:a>><setvar[a,false]:1><macro:m>")?, "1");
        assert_eq!(expand(&engine, "<var:missing><macro:missing>")?, "");
        Ok(())
    }

    #[test]
    fn append_and_prepend() -> Result<()> {
        let engine = Engine::new();
        let text = "<setvar[v,false]:b><wcaddvar[v]:c><wcaddvar[v,prepend]:a><var:v>";
        assert_eq!(expand(&engine, text)?, "abc");
        let text = "<wcaddmacro[m]:<var:x>><wcaddmacro[m,PREPEND]:y><setvar[x,false]:z><macro:m>";
        assert_eq!(expand(&engine, text)?, "yz");
        let expansion = engine.expand("<wcaddvar:c>", &mut rand::thread_rng())?;
        assert_eq!(expansion.warnings.len(), 1);
        Ok(())
    }

    #[test]
    fn push_and_pop() -> Result<()> {
        let engine = Engine::new();
        let text = "<setmacro[f,false]:outer><wcpushmacro[f]:inner><macro:f>,<wcpopmacro:f><macro:f>";
        assert_eq!(expand(&engine, text)?, "inner,outer");
        let text = "<wcpushmacro[g]:<random:only>><wcpopmacro:g><macro:g>";
        assert_eq!(expand(&engine, text)?, "only");
        Ok(())
    }

    #[test]
    fn negative_prompt() -> Result<()> {
        let engine = Engine::new();
        let text = "cat<wcnegative:, blurry><wcnegative[prepend]:<random:ugly>, >";
        let expansion = engine.expand(text, &mut rand::thread_rng())?;
        assert_eq!(expansion.text, "cat");
        assert_eq!(expansion.negative, "ugly, , blurry");
        Ok(())
    }

    #[test]
    fn match_and_case() -> Result<()> {
        let engine = Engine::new();
        let text = "<setvar[n,false]:2><wcmatch:<wccase[n eq 1]:one><wccase[n eq 2]:two><wccase:other>>";
        assert_eq!(expand(&engine, text)?, "two");
        let text = "<wcmatch:<wccase[false]:a><wccase:default><wccase:late>>";
        assert_eq!(expand(&engine, text)?, "default");
        let text = "<wcmatch:<wccase[false]:a><wcmatch:<wccase:x>><wccase:b>>";
        assert_eq!(expand(&engine, text)?, "xb");
        Ok(())
    }

    #[test]
    fn fired_case_is_trimmed() -> Result<()> {
        let engine = Engine::new();
        let text = "<setvar[n,false]:2>[<wcmatch:<wccase[n eq 2]:  two  ><wccase: other >>]";
        assert_eq!(expand(&engine, text)?, "[two]");
        let text = "[<wcmatch:<wccase[false]:a><wccase: other >>]";
        assert_eq!(expand(&engine, text)?, "[ other ]");
        Ok(())
    }

    #[test]
    fn weighted_draws_follow_weights() -> Result<()> {
        let engine = Engine::new();
        let mut rng = StdRng::seed_from_u64(42);
        let mut heavy = 0;
        for _ in 0..2000 {
            if engine.expand("<random:9::a|1::b>", &mut rng)?.text == "a" {
                heavy += 1;
            }
        }
        assert!((1700..=1900).contains(&heavy), "drew a {} times", heavy);
        Ok(())
    }

    #[test]
    fn non_ascii_choices() -> Result<()> {
        let engine = Engine::new().with_wildcards(WildcardSet::from_map(hashmap! {
            "früchte" => vec!["äpfel", "日本の梨"],
        }));
        assert_eq!(expand(&engine, "<random:0::ñ|ü>")?, "ü");
        let out = expand(&engine, "<random[2,·]:é|日>")?;
        assert!(out == "é·日" || out == "日·é");
        let out = expand(&engine, "<wcwildcard:früchte>")?;
        assert!(out == "äpfel" || out == "日本の梨");
        Ok(())
    }

    #[test]
    fn draw_count_is_capped() -> Result<()> {
        let engine = Engine::new();
        let expansion = engine.expand("<random[5000,]:x>", &mut StdRng::seed_from_u64(1))?;
        assert_eq!(expansion.text.split(", ").count(), MAX_DRAWS);
        assert_eq!(expansion.warnings.len(), 1);
        assert!(expansion.warnings[0].contains("capped"));
        let longest = longest_repeated(vec!["ab".into(), "a".into()], Quantity::exactly(usize::MAX), "");
        assert_eq!(longest.len(), 2 * MAX_DRAWS);
        Ok(())
    }

    #[test]
    fn broken_conditions_do_not_fire() -> Result<()> {
        let engine = Engine::new();
        let expansion = engine.expand(
            "<wcmatch:<wccase[1 +]:bad><wccase:fallback>>",
            &mut rand::thread_rng(),
        )?;
        assert_eq!(expansion.text, "fallback");
        assert_eq!(expansion.warnings.len(), 1);
        Ok(())
    }

    #[test]
    fn estimates() {
        let engine = colors();
        assert_eq!(engine.estimate("<random[2,]:a|bbb|cc>"), "bbb, bbb");
        assert_eq!(engine.estimate("<wcwildcard:colors>"), "yellow");
        assert_eq!(engine.estimate("<setvar[a,false]:long text>x"), "x");
        assert_eq!(engine.estimate("<fromto[1]:a||bb>"), "[a:bb:1]");
        assert_eq!(engine.estimate("<comment:anything>"), "");
        assert_eq!(
            engine.estimate("<wcmatch:<wccase[a]:xx><wccase:xxxx><wccase:x>>"),
            "xxxx"
        );
    }
}
