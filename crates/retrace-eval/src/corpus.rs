//! Built-in evaluation corpus and query set.
//!
//! 35 curated documentation pages spanning distinct topics, plus graded
//! queries with expected urls. Page text is representative of what the
//! extractor collaborator produces for real documentation pages: a few
//! clean sentences dominated by the page's topic vocabulary.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A corpus page fed through the normal `index()` path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestPage {
    pub url: String,
    pub title: String,
    pub content: String,
}

/// A graded evaluation query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalQuery {
    pub query: String,
    /// Urls counted as relevant for precision/recall/MRR.
    pub expected_urls: Vec<String>,
    /// Graded relevance 0..5 per url, for NDCG.
    pub relevance: HashMap<String, u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn page(url: &str, title: &str, content: &str) -> TestPage {
    TestPage {
        url: url.to_string(),
        title: title.to_string(),
        content: content.to_string(),
    }
}

/// The 35-page documentation corpus.
pub fn builtin_corpus() -> Vec<TestPage> {
    vec![
        page(
            "https://react.dev/reference/react/hooks",
            "React Hooks Reference",
            "Hooks let a React component use state and other features from function code. \
             The useState hook stores component state and returns the current state with a \
             setter. The useEffect hook runs effects after render, and effects can clean up \
             subscriptions when the component unmounts. Every hook must be called at the top \
             level of the component so React can track hooks between renders.",
        ),
        page(
            "https://react.dev/learn",
            "Learn React",
            "React builds interfaces out of components that receive props and render markup. \
             State lives inside components, and updating state triggers a new render. \
             Effects synchronize a component with outside systems. This guide walks through \
             writing your first component, passing props, managing state with hooks, and \
             running effects at the right moments.",
        ),
        page(
            "https://www.python.org/doc/",
            "Python 3 Documentation",
            "The official Python documentation collects the language reference, the library \
             reference, and the tutorial in one place. Start with the tutorial if you are \
             new to Python, then keep the library reference nearby while writing Python \
             programs. Installation notes, pip usage, and interpreter docs for every Python \
             release live here as well.",
        ),
        page(
            "https://kubernetes.io/docs/concepts/",
            "Kubernetes Concepts",
            "Kubernetes is a system for managing containerized applications across a \
             cluster of machines. You describe desired state and Kubernetes schedules \
             containers into pods, replaces failed pods, and scales deployments up or down. \
             Workloads built as Docker containers run unchanged, while services, rollouts, \
             and orchestration concepts keep the cluster converging toward the declared \
             configuration.",
        ),
        page(
            "https://doc.rust-lang.org/book/ch04-00-understanding-ownership.html",
            "The Rust Book: Ownership",
            "Ownership is the set of rules that governs how a Rust program manages memory. \
             Each value in Rust has an owner, and when the owner goes out of scope the \
             value is dropped. Borrowing creates references to a value without taking \
             ownership, and the borrow checker compares lifetimes so every borrow stays \
             valid. Mastering ownership, borrowing, and lifetimes is the heart of writing \
             Rust.",
        ),
        page(
            "https://doc.rust-lang.org/reference/",
            "The Rust Reference",
            "The Rust Reference describes the syntax and semantics of every stable Rust \
             construct. It covers items, expressions, patterns, the type system, lifetimes \
             and borrowing in precise detail, plus linkage and the behavior cargo relies \
             on. Where the book teaches Rust by example, the reference nails down exactly \
             what each construct means.",
        ),
        page(
            "https://git-scm.com/docs/git-commit",
            "git commit Documentation",
            "The git commit command records staged changes as a new commit on the current \
             branch. Use the amend flag to rewrite the most recent commit, or git reset to \
             move the branch before a commit entirely. Commits reference their parents, so \
             a branch is just a pointer that advances with each commit, and merge commits \
             join two histories together.",
        ),
        page(
            "https://developer.mozilla.org/en-US/docs/Web/CSS/CSS_flexible_box_layout",
            "CSS Flexible Box Layout",
            "Flexbox is a one-dimensional CSS layout model for distributing space between \
             items. A flex container lays out its children along a main axis, and CSS \
             properties control how items grow, shrink, and align. Compared with grid, \
             flexbox excels at toolbar and navigation layout where styles adapt to the \
             size of the content. Selectors and gap styling round out the layout toolkit.",
        ),
        page(
            "https://www.postgresql.org/docs/current/transaction-iso.html",
            "PostgreSQL Transaction Isolation",
            "PostgreSQL implements the four SQL standard transaction isolation levels. \
             Read committed is the default, repeatable read prevents nonrepeatable reads \
             within a transaction, and serializable makes concurrent transactions behave \
             as if they ran one at a time. Choosing an isolation level in Postgres trades \
             throughput against the anomalies a transaction may observe.",
        ),
        page(
            "https://pytorch.org/tutorials/",
            "PyTorch Training Tutorials",
            "These tutorials teach training neural networks with PyTorch from the ground \
             up. Build tensors, define networks as modules, and run training loops that \
             compute gradients with autograd. Later chapters cover transfer learning, \
             distributed training across devices, and exporting trained networks for \
             inference. Each tutorial pairs runnable code with explanations of the \
             gradient mechanics.",
        ),
        page(
            "https://nodejs.org/en/learn/asynchronous-work",
            "Node.js Event Loop",
            "Node.js processes requests on a single thread using an event loop backed by \
             libuv. Callbacks run when their operations finish, so the process never \
             blocks on disk or the network. Timers, promises, and queued microtasks each \
             have a place in the loop's phases, and understanding those phases explains \
             why some callbacks fire before others.",
        ),
        page(
            "https://expressjs.com/en/guide/using-middleware.html",
            "Express Middleware",
            "Express applications are chains of middleware functions that handle requests \
             in order. Each middleware can modify the request, send a response, or pass \
             control onward. Routers group related paths, error handlers catch thrown \
             failures, and third-party middleware adds parsing, sessions, and logging to \
             the chain with a single call.",
        ),
        page(
            "https://www.typescriptlang.org/docs/handbook/intro.html",
            "TypeScript Handbook",
            "TypeScript adds static types on top of JavaScript. The handbook explains \
             annotating variables and functions, narrowing with control flow analysis, \
             and composing interfaces, unions, and generics. The compiler erases types at \
             build time, so TypeScript programs run anywhere JavaScript runs while \
             catching whole classes of mistakes during development.",
        ),
        page(
            "https://vuejs.org/guide/essentials/template-syntax.html",
            "Vue Template Syntax",
            "Vue templates extend HTML with directives that bind data to the document. \
             Mustache interpolation renders values, v-if and v-for control structure, and \
             v-model wires form inputs to reactive data. The reactivity system tracks \
             which data each binding reads and patches only the parts of the page that \
             actually changed.",
        ),
        page(
            "https://www.mongodb.com/docs/manual/aggregation/",
            "MongoDB Aggregation",
            "Aggregation pipelines transform collections of documents through ordered \
             stages. A match stage filters documents, group accumulates values, and \
             project reshapes the output. Pipelines run inside the database engine, so \
             shaping data there avoids shipping whole collections to the application just \
             to compute a summary.",
        ),
        page(
            "https://redis.io/docs/data-types/",
            "Redis Data Types",
            "Redis keeps data in memory and offers rich value types beyond plain strings. \
             Lists push and pop from both ends, hashes hold field and value pairs, sets \
             track unique members, and sorted sets order members by score. Choosing the \
             right value type keeps operations constant time and memory predictable.",
        ),
        page(
            "https://nginx.org/en/docs/http/ngx_http_proxy_module.html",
            "NGINX Proxying",
            "NGINX forwards requests to upstream servers and relays their responses. \
             Proxy buffering absorbs slow backends, upstream blocks define server pools \
             with weights, and health checks remove failing peers from rotation. Headers \
             can be rewritten on the way through, which keeps backends unaware of the \
             proxy in front of them.",
        ),
        page(
            "https://graphql.org/learn/queries/",
            "GraphQL Queries",
            "A GraphQL query names exactly the fields the client needs and the server \
             returns just that shape. Arguments refine fields, fragments share selections \
             between queries, and variables keep operations reusable. The schema defines \
             what can be asked, and resolvers compute each field when a request arrives.",
        ),
        page(
            "https://webpack.js.org/concepts/",
            "Webpack Bundling",
            "Webpack walks the import graph of an application and emits optimized \
             bundles. Loaders teach it to process stylesheets, images, and other assets \
             as modules, while plugins hook the build to minify output or inject \
             environment values. Code splitting breaks bundles apart so browsers download \
             only what a page needs.",
        ),
        page(
            "https://jestjs.io/docs/using-matchers",
            "Jest Matchers",
            "Jest tests assert values with matchers. The expect function wraps a value, \
             and matchers like toBe, toEqual, and toContain compare it against what the \
             test predicts. Snapshot matchers capture rendered output for review, and \
             mock matchers verify how stub functions were called during a test run.",
        ),
        page(
            "https://spring.io/guides/gs/spring-boot",
            "Spring Beans",
            "Spring builds applications from beans wired together by dependency \
             injection. The application context instantiates beans, resolves their \
             dependencies, and injects them where declared. Annotations mark candidates \
             for scanning, configuration classes define beans explicitly, and scopes \
             control whether a bean is shared or created per use.",
        ),
        page(
            "https://go.dev/tour/concurrency/1",
            "A Tour of Go",
            "Goroutines are lightweight threads managed by the Go runtime, started with \
             the go keyword. Channels carry values between goroutines and synchronize \
             them at the same time. Select waits on several channel operations at once, \
             which makes fan-in and timeout patterns short and readable in Go programs.",
        ),
        page(
            "https://www.swift.org/documentation/",
            "Swift Optionals",
            "Optionals make the absence of a value explicit in Swift. An optional either \
             holds a value or holds nil, and unwrapping is required before use. Optional \
             binding with if let, the guard statement, and optional chaining each provide \
             a safe path from optional to concrete value without crashing the program.",
        ),
        page(
            "https://kotlinlang.org/docs/coroutines-overview.html",
            "Kotlin Coroutines",
            "Coroutines bring structured concurrency to Kotlin. A suspend function can \
             pause without blocking its thread, and coroutine builders launch work inside \
             a scope that controls its lifetime. Flows emit streams of values that are \
             collected with suspending operators, and cancellation propagates through a \
             scope automatically.",
        ),
        page(
            "https://developer.hashicorp.com/terraform/intro",
            "Terraform Providers",
            "Terraform provisions infrastructure from declarative configuration. \
             Providers translate resource blocks into calls against each platform, the \
             plan step previews changes, and apply executes them in dependency order. \
             Remote backends store shared history so a team sees the same view of the \
             infrastructure it provisions.",
        ),
        page(
            "https://prometheus.io/docs/introduction/overview/",
            "Prometheus Metrics",
            "Prometheus scrapes metrics from instrumented targets on an interval and \
             stores them as time series. Counters only rise, gauges move both ways, and \
             histograms bucket observations for percentile math. PromQL slices series by \
             label, and alerting rules evaluate expressions to page an operator when a \
             threshold trips.",
        ),
        page(
            "https://www.elastic.co/guide/en/elasticsearch/reference/current/analysis.html",
            "Elasticsearch Analyzers",
            "Elasticsearch analyzes text at write time into an inverted index of terms. \
             An analyzer chains character filters, a tokenizer, and token filters, so \
             the same text can be searched case-insensitively, stemmed, or split on \
             custom boundaries. Shards spread the index across nodes and replicas keep \
             searches flowing during maintenance.",
        ),
        page(
            "https://kafka.apache.org/documentation/#intro_concepts_and_terms",
            "Kafka Topics",
            "Kafka organizes events into topics split across partitions. Producers \
             append records to partitions, consumers read them in order, and consumer \
             groups share partitions for parallel processing. Offsets mark how far each \
             group has read, and retention keeps records replayable for late consumers \
             and rebuilds.",
        ),
        page(
            "https://www.rabbitmq.com/tutorials/amqp-concepts",
            "RabbitMQ Exchanges",
            "RabbitMQ routes messages through exchanges before they reach queues. Direct \
             exchanges match a routing key exactly, topic exchanges match patterns, and \
             fanout exchanges copy to every bound queue. Acknowledgements confirm \
             delivery, and dead letter exchanges collect messages that could not be \
             processed.",
        ),
        page(
            "https://www.sqlite.org/pragma.html",
            "SQLite Pragmas",
            "SQLite stores an entire database in one file, and pragma statements adjust \
             how the engine treats that file. The journal mode pragma switches to \
             write-ahead logging, synchronous tunes how eagerly data reaches disk, and \
             foreign keys toggles constraint enforcement. Pragmas apply per connection \
             and take effect immediately.",
        ),
        page(
            "https://vimhelp.org/motion.txt.html",
            "Vim Motions",
            "Vim edits compose operators with motions. A motion moves the cursor, an \
             operator acts over the text the motion crosses, and counts repeat either \
             one. Word motions, paragraph motions, and searches all combine with delete, \
             change, and yank, which is why practiced Vim editing reads like a tiny \
             language.",
        ),
        page(
            "https://www.gnu.org/software/emacs/manual/html_node/elisp/",
            "Emacs Lisp Basics",
            "Emacs is programmable through Emacs Lisp. Buffers hold text, windows \
             display buffers, and every keystroke dispatches to an interactive function \
             that elisp can replace or extend. Hooks run code at well-known moments, and \
             the customize system persists settings between sessions without hand \
             editing files.",
        ),
        page(
            "https://www.gnu.org/software/bash/manual/bash.html",
            "Bash Pipelines",
            "Bash connects processes with pipes so the output of one command feeds the \
             next. Redirection sends streams to files, globbing expands patterns into \
             filenames, and exit codes let conditionals react to failure. Quoting rules \
             decide how words split, which is the source of most surprising shell \
             behavior.",
        ),
        page(
            "https://aws.amazon.com/lambda/",
            "AWS Lambda Basics",
            "Lambda runs functions on demand without servers to operate. An event such \
             as an upload or a queue message invokes the function, the platform scales \
             instances with traffic, and billing counts execution time. Cold starts add \
             latency to the first invocation, so latency-sensitive paths keep functions \
             warm or small.",
        ),
        page(
            "https://restfulapi.net/resource-naming/",
            "REST Resource Design",
            "REST models an API as resources addressed by nouns. Verbs come from HTTP \
             methods, status codes report outcomes, and representations carry the \
             resource body. Pagination bounds list responses, filtering narrows them, \
             and consistent naming keeps endpoints predictable as an API grows.",
        ),
    ]
}

/// The graded query set over [`builtin_corpus`].
pub fn builtin_queries() -> Vec<EvalQuery> {
    fn query(
        text: &str,
        expected: &[&str],
        graded: &[(&str, u8)],
        description: &str,
    ) -> EvalQuery {
        EvalQuery {
            query: text.to_string(),
            expected_urls: expected.iter().map(|s| s.to_string()).collect(),
            relevance: graded
                .iter()
                .map(|(url, rel)| (url.to_string(), *rel))
                .collect(),
            description: Some(description.to_string()),
        }
    }

    vec![
        query(
            "how do i use state and effects in react components",
            &[
                "https://react.dev/reference/react/hooks",
                "https://react.dev/learn",
            ],
            &[
                ("https://react.dev/reference/react/hooks", 5),
                ("https://react.dev/learn", 4),
            ],
            "Natural-language framework question; both React pages are relevant",
        ),
        query(
            "python docs",
            &["https://www.python.org/doc/"],
            &[("https://www.python.org/doc/", 5)],
            "Short navigational query",
        ),
        query(
            "that thing for managing lots of docker containers",
            &["https://kubernetes.io/docs/concepts/"],
            &[("https://kubernetes.io/docs/concepts/", 5)],
            "Vague recall query with no token overlap on the product name",
        ),
        query(
            "rust ownership and borrowing rules",
            &[
                "https://doc.rust-lang.org/book/ch04-00-understanding-ownership.html",
                "https://doc.rust-lang.org/reference/",
            ],
            &[
                (
                    "https://doc.rust-lang.org/book/ch04-00-understanding-ownership.html",
                    5,
                ),
                ("https://doc.rust-lang.org/reference/", 3),
            ],
            "Conceptual language question with a canonical chapter",
        ),
        query(
            "undo the last git commit",
            &["https://git-scm.com/docs/git-commit"],
            &[("https://git-scm.com/docs/git-commit", 5)],
            "Task-oriented version control query",
        ),
        query(
            "css flexbox layout guide",
            &["https://developer.mozilla.org/en-US/docs/Web/CSS/CSS_flexible_box_layout"],
            &[(
                "https://developer.mozilla.org/en-US/docs/Web/CSS/CSS_flexible_box_layout",
                5,
            )],
            "Topic plus document-type query",
        ),
        query(
            "postgres transaction isolation levels",
            &["https://www.postgresql.org/docs/current/transaction-iso.html"],
            &[(
                "https://www.postgresql.org/docs/current/transaction-iso.html",
                5,
            )],
            "Precise database semantics query",
        ),
        query(
            "training neural networks with pytorch",
            &["https://pytorch.org/tutorials/"],
            &[("https://pytorch.org/tutorials/", 5)],
            "Machine learning how-to query",
        ),
    ]
}
