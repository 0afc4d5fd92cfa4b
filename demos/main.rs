use std::env;
use std::io::{self, Read};
use std::thread;
use std::time::Duration;

use wildprompt::{Engine, WildcardSet};

const DEFAULT: &str = "a {2$$ and $$__adjective__|__adjective__|__adjective__} __color__ __animal__ \
                       jumps over the [__animal__|__animal__]";

const WILDCARDS: &str = r#"{
    "adjective": [ "quick", "lazy", "slow", "tired", "awake", "frantic" ],
    "color": [ "blue", "red", "yellow", "green", "purple", "orange", "pink", "brown" ],
    "animal": [ "dog", "fox", "cow", "horse", "chicken", "pig", "bird", "fish" ]
}"#;

fn main() {
    let args = env::args().skip(1).take(1);
    let mut src: String = args.collect();
    if src.is_empty() {
        src = DEFAULT.to_string();
    }
    if src == "-" {
        let mut buffer = String::new();
        let _ = io::stdin().read_to_string(&mut buffer);
        src = buffer;
    }
    let wildcards = match WildcardSet::from_json(WILDCARDS) {
        Ok(wildcards) => wildcards,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };
    let engine = Engine::new().with_wildcards(wildcards);
    let mut diagnostics = wildprompt::Diagnostics::new();
    println!("{}", engine.transpiler().transpile(&src, &mut diagnostics));
    for _ in 0..5 {
        match engine.expand_source(&src, &mut rand::thread_rng()) {
            Ok(expansion) => {
                println!("{}", expansion.text);
                for warning in expansion.warnings {
                    eprintln!("{}", warning);
                }
            }
            Err(e) => eprintln!("{}", e),
        }
        thread::sleep(Duration::from_secs(1));
    }
}
