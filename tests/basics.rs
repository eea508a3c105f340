use dibox::{
    Args, Bind, BindingKey, Container, DiError, DiResult, Factory, Injectable, Instance, Param, Target, Type,
    TypeQuery,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Bar {
    s: String,
}

impl Injectable for Bar {
    fn construct(_args: Args) -> DiResult<Self> {
        Ok(Bar { s: "derived".into() })
    }
}

#[derive(Debug)]
struct Foo {
    bar: Arc<Bar>,
}

impl Injectable for Foo {
    fn dependencies() -> Vec<Param> {
        vec![Param::dependency::<Bar>("bar")]
    }

    fn construct(args: Args) -> DiResult<Self> {
        Ok(Foo { bar: args.get("bar")? })
    }
}

fn bar_instance(s: &str) -> Instance {
    Instance::new(Bar { s: s.to_string() })
}

fn bar_factory(s: &'static str) -> Factory {
    Factory::new([], move |_| Ok(bar_instance(s)))
}

fn tag_of(value: dibox::AnyArc) -> String {
    value.downcast::<Bar>().unwrap().s.clone()
}

#[tokio::test]
async fn test_provide_returns_same_instance_on_second_call() {
    let container = Container::new();
    container.bind(Bind::ty::<Bar>().factory(bar_factory("test"))).unwrap();

    let first = container.provide::<Bar>().await.unwrap();
    let second = container.provide::<Bar>().await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let named_first = container.provide_named::<Bar>("arg").await.unwrap();
    let named_second = container.provide_named::<Bar>("arg").await.unwrap();
    assert!(Arc::ptr_eq(&named_first, &named_second));
    assert!(Arc::ptr_eq(&first, &named_first));
    assert_eq!(container.instance_count(), 1);
}

#[tokio::test]
async fn test_equivalent_unions_share_one_instance() {
    let container = Container::new();
    container.bind(Bind::ty::<Bar>().factory(bar_factory("test"))).unwrap();

    let union = TypeQuery::union([Type::of::<Bar>(), Type::of::<Foo>()]);
    let same_union = TypeQuery::union([Type::of::<Bar>(), Type::of::<Foo>(), Type::of::<Bar>()]);

    let first = container.provide_any(&union, None).await.unwrap();
    let second = container.provide_any(&same_union, None).await.unwrap();
    let direct = container.provide::<Bar>().await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first.downcast::<Bar>().unwrap(), &direct));
}

#[tokio::test]
async fn test_precedence_exact_then_type_then_name() {
    struct Other;
    #[derive(Debug)]
    struct Unbound;

    #[derive(Debug)]
    struct Buildable;
    impl Injectable for Buildable {
        fn construct(_args: Args) -> DiResult<Self> {
            Ok(Buildable)
        }
    }

    let container = Container::new();
    container
        .bind(Bind::ty::<Bar>().name("arg").instance(bar_instance("X")))
        .unwrap();
    container.bind(Bind::ty::<Bar>().instance(bar_instance("Y"))).unwrap();
    container.bind(Bind::named("arg").instance(bar_instance("Z"))).unwrap();

    let exact = container.provide_any(&TypeQuery::of::<Bar>(), Some("arg")).await.unwrap();
    let type_only = container.provide_any(&TypeQuery::of::<Bar>(), Some("other")).await.unwrap();
    let name_only = container.provide_any(&TypeQuery::of::<Other>(), Some("arg")).await.unwrap();
    assert_eq!(tag_of(exact), "X");
    assert_eq!(tag_of(type_only), "Y");
    assert_eq!(tag_of(name_only), "Z");

    let err = container.provide_value::<Unbound>(Some("x")).await.unwrap_err();
    assert!(matches!(err, DiError::NoBindingFound { .. }));
    assert!(container.provide_named::<Buildable>("x").await.is_ok());
}

#[tokio::test]
async fn test_cached_type_only_instance_shadows_later_exact_binding() {
    let container = Container::new();
    container
        .bind(Bind::ty::<Bar>().name("arg").instance(bar_instance("X")))
        .unwrap();
    container.bind(Bind::ty::<Bar>().instance(bar_instance("Y"))).unwrap();

    let type_only = container.provide_any(&TypeQuery::of::<Bar>(), Some("other")).await.unwrap();
    assert_eq!(tag_of(type_only), "Y");

    // (Bar, None) is cached now, and the cache answers before the bindings
    let exact = container.provide_any(&TypeQuery::of::<Bar>(), Some("arg")).await.unwrap();
    assert_eq!(tag_of(exact), "Y");
    assert_eq!(container.instance_count(), 1);

    container.close().await.unwrap();
    let exact = container.provide_any(&TypeQuery::of::<Bar>(), Some("arg")).await.unwrap();
    assert_eq!(tag_of(exact), "X");
}

#[tokio::test]
async fn test_union_fan_out_follows_declared_order() {
    struct TypeA {
        tag: &'static str,
    }
    struct TypeB {
        tag: &'static str,
    }

    let union_ab = TypeQuery::union([Type::of::<TypeA>(), Type::of::<TypeB>()]);
    let union_ba = TypeQuery::union([Type::of::<TypeB>(), Type::of::<TypeA>()]);

    let container = Container::new();
    container
        .bind(Bind::ty::<TypeB>().instance(Instance::new(TypeB { tag: "b" })))
        .unwrap();
    let only_b = container.provide_any(&union_ab, None).await.unwrap();
    assert_eq!(only_b.downcast::<TypeB>().unwrap().tag, "b");

    for (query, expected) in [(&union_ab, "a"), (&union_ba, "b")] {
        let container = Container::new();
        container
            .bind(Bind::ty::<TypeA>().instance(Instance::new(TypeA { tag: "a" })))
            .unwrap();
        container
            .bind(Bind::ty::<TypeB>().instance(Instance::new(TypeB { tag: "b" })))
            .unwrap();
        let value = container.provide_any(query, None).await.unwrap();
        let tag = match value.clone().downcast::<TypeA>() {
            Ok(a) => a.tag,
            Err(_) => value.downcast::<TypeB>().unwrap().tag,
        };
        assert_eq!(tag, expected);
    }
}

#[tokio::test]
async fn test_union_without_bound_member_fails() {
    struct Unbound;
    let container = Container::new();
    let query = TypeQuery::union([Type::of::<Unbound>(), Type::of::<String>()]);
    let err = container.provide_any(&query, Some("arg")).await.unwrap_err();
    assert!(matches!(err, DiError::NoBindingFound { .. }));
}

#[tokio::test]
async fn test_first_registered_predicate_wins() {
    #[derive(Debug)]
    struct Widget {
        source: &'static str,
    }

    let container = Container::new();
    container
        .bind(Bind::predicate(|ty| ty.is::<Widget>()).factory(Factory::new([], |_| {
            Ok(Instance::new(Widget { source: "first" }))
        })))
        .unwrap();
    container
        .bind(Bind::predicate(|_| true).factory(Factory::new([], |_| {
            Ok(Instance::new(Widget { source: "second" }))
        })))
        .unwrap();

    let widget = container.provide_value::<Widget>(Some("any")).await.unwrap();
    assert_eq!(widget.source, "first");
    assert_eq!(container.registered_count(), 2);
}

#[tokio::test]
async fn test_provide_injects_previously_provided_dependencies() {
    let container = Container::new();
    let bar = container.provide::<Bar>().await.unwrap();
    let foo = container.provide::<Foo>().await.unwrap();
    assert!(Arc::ptr_eq(&foo.bar, &bar));
    assert!(Arc::ptr_eq(&container.get::<Foo>().unwrap(), &foo));
}

#[tokio::test]
async fn test_get_fails_when_nothing_was_provided() {
    let container = Container::new();
    let err = container.get::<Foo>().unwrap_err();
    match err {
        DiError::NotFound { type_name, name } => {
            assert!(type_name.ends_with("Foo"));
            assert_eq!(name, None);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_async_factory_with_named_sub_dependencies() {
    let container = Container::new();
    container.bind(Bind::ty::<Bar>().to(Target::implementation::<Bar>())).unwrap();
    container
        .bind(Bind::ty::<Bar>().name("special").factory(bar_factory("special")))
        .unwrap();
    container
        .bind(Bind::ty::<Foo>().factory(Factory::new_async(
            [Param::dependency::<Bar>("special")],
            |args| async move {
                tokio::task::yield_now().await;
                Ok::<_, DiError>(Instance::new(Foo { bar: args.get("special")? }))
            },
        )))
        .unwrap();

    let foo = container.provide::<Foo>().await.unwrap();
    let usual = container.provide::<Bar>().await.unwrap();

    assert_eq!(foo.bar.s, "special");
    assert_eq!(usual.s, "derived");
    assert!(!Arc::ptr_eq(&usual, &foo.bar));
}

#[tokio::test]
async fn test_async_factory_with_bound_instance_dependency() {
    let container = Container::new();
    container.bind(Bind::ty::<Bar>().instance(bar_instance("Yay"))).unwrap();
    container
        .bind(Bind::ty::<Foo>().factory(Factory::new_async(
            [Param::dependency::<Bar>("special")],
            |args| async move { Ok::<_, DiError>(Instance::new(Foo { bar: args.get("special")? })) },
        )))
        .unwrap();

    let foo = container.provide::<Foo>().await.unwrap();
    let bar = container.provide::<Bar>().await.unwrap();
    assert_eq!(foo.bar.s, "Yay");
    assert!(Arc::ptr_eq(&foo.bar, &bar));
}

#[tokio::test]
async fn test_missing_required_argument() {
    #[derive(Debug)]
    struct Mandatory;
    impl Injectable for Mandatory {
        fn dependencies() -> Vec<Param> {
            vec![Param::type_arg("ty"), Param::untyped("s")]
        }

        fn construct(args: Args) -> DiResult<Self> {
            args.get_any("s")?;
            Ok(Mandatory)
        }
    }

    let container = Container::new();
    let err = container.provide::<Mandatory>().await.unwrap_err();
    match err {
        DiError::MissingRequiredArgument { param, factory } => {
            assert_eq!(param, "s");
            assert!(factory.ends_with("Mandatory"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(container.instance_count(), 0);
}

#[tokio::test]
async fn test_missing_dependency_leaves_store_unchanged() {
    struct Unbound;

    let container = Container::new();
    container
        .bind(Bind::ty::<Foo>().factory(Factory::new([Param::value::<Unbound>("dep")], |_| {
            Ok(Instance::new(()))
        })))
        .unwrap();

    let err = container.provide_value::<Foo>(None).await.unwrap_err();
    match err {
        DiError::NoBindingFound { type_name, name } => {
            assert!(type_name.ends_with("Unbound"));
            assert_eq!(name.as_deref(), Some("dep"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(container.instance_count(), 0);
}

// ===== Type argument injection =====

#[derive(Debug)]
struct Derived {
    s: String,
    ty: Type,
}

fn derived_factory(first: Param) -> Factory {
    let name = first.name();
    Factory::new([first], move |args| {
        Ok(Instance::new(Derived {
            s: "bar".into(),
            ty: args.type_arg(name)?,
        }))
    })
}

#[tokio::test]
async fn test_predicate_factory_receives_matched_type() {
    for first in [Param::untyped("t"), Param::type_arg("t")] {
        let container = Container::new();
        container
            .bind(Bind::predicate(|ty| ty.is::<Derived>()).factory(derived_factory(first)))
            .unwrap();

        let derived = container.provide_value::<Derived>(None).await.unwrap();
        assert_eq!(derived.s, "bar");
        assert!(derived.ty.is::<Derived>());
    }
}

#[tokio::test]
async fn test_bound_args_are_partially_applied() {
    #[derive(Debug)]
    struct Greeting {
        text: String,
        ty: Type,
    }

    let container = Container::new();
    container
        .bind(
            Bind::ty::<Greeting>()
                .factory(Factory::new(
                    [
                        Param::type_arg("t"),
                        Param::value::<String>("a"),
                        Param::value::<String>("b"),
                    ],
                    |args| {
                        Ok(Instance::new(Greeting {
                            text: format!("{} {}", args.cloned::<String>("a")?, args.cloned::<String>("b")?),
                            ty: args.type_arg("t")?,
                        }))
                    },
                ))
                .arg("a", "hello".to_string()),
        )
        .unwrap();
    container
        .bind(Bind::ty::<String>().name("b").instance(Instance::new("world".to_string())))
        .unwrap();

    let greeting = container.provide_value::<Greeting>(Some("arg")).await.unwrap();
    assert_eq!(greeting.text, "hello world");
    assert!(greeting.ty.is::<Greeting>());
}

// ===== Scenarios =====

trait Service: Send + Sync {
    fn tag(&self) -> String;
}

struct ServiceImpl {
    tag: String,
}

impl Service for ServiceImpl {
    fn tag(&self) -> String {
        self.tag.clone()
    }
}

impl Injectable for ServiceImpl {
    fn dependencies() -> Vec<Param> {
        vec![Param::value::<String>("tag").optional()]
    }

    fn construct(args: Args) -> DiResult<Self> {
        let tag = args.get_optional::<String>("tag")?;
        Ok(ServiceImpl {
            tag: tag.map_or_else(|| "impl".to_string(), |tag| (*tag).clone()),
        })
    }
}

fn as_service(service: Arc<ServiceImpl>) -> Arc<dyn Service> {
    service
}

#[tokio::test]
async fn test_service_bound_to_implementation() {
    let container = Container::new();
    container
        .bind(Bind::ty::<dyn Service>().to(Target::implementation_as(as_service)))
        .unwrap();

    let first = container.provide_trait::<dyn Service>(None).await.unwrap();
    let second = container.provide_trait::<dyn Service>(None).await.unwrap();
    assert_eq!(first.tag(), "impl");
    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &container.get_trait::<dyn Service>(None).unwrap()));
}

#[tokio::test]
async fn test_service_implementation_with_bound_args() {
    let container = Container::new();
    container
        .bind(
            Bind::ty::<dyn Service>()
                .name("arg")
                .to(Target::implementation_as(as_service))
                .arg("tag", "test".to_string()),
        )
        .unwrap();

    let service = container.provide_trait::<dyn Service>(Some("arg")).await.unwrap();
    assert_eq!(service.tag(), "test");
}

#[tokio::test]
async fn test_config_predicate_loader() {
    #[derive(Debug)]
    struct DbConfig {
        source: String,
    }
    #[derive(Debug)]
    struct CacheConfig {
        source: String,
    }

    let loads = Arc::new(AtomicUsize::new(0));
    let counter = loads.clone();
    let loader = Factory::new([Param::type_arg("config_type")], move |args| {
        counter.fetch_add(1, Ordering::SeqCst);
        let ty = args.type_arg("config_type")?;
        let source = format!("loaded {}", ty.short_name());
        if ty.is::<DbConfig>() {
            Ok(Instance::new(DbConfig { source }))
        } else if ty.is::<CacheConfig>() {
            Ok(Instance::new(CacheConfig { source }))
        } else {
            Err(DiError::factory(format!("unknown config {ty}")))
        }
    });

    let container = Container::new();
    container
        .bind(Bind::predicate(|ty| ty.short_name().ends_with("Config")).factory(loader))
        .unwrap();

    let db = container.provide_value::<DbConfig>(Some("db")).await.unwrap();
    let again = container.provide_value::<DbConfig>(None).await.unwrap();
    assert_eq!(db.source, "loaded DbConfig");
    assert!(Arc::ptr_eq(&db, &again));
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(
        container.instance_keys(),
        vec![BindingKey::new(Some(Type::of::<DbConfig>()), None)]
    );

    let cache = container.provide_value::<CacheConfig>(None).await.unwrap();
    assert_eq!(cache.source, "loaded CacheConfig");
    assert_eq!(loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_ambiguous_binding_specs_are_rejected() {
    let container = Container::new();
    let specs = [
        Bind::ty::<Bar>(),
        Bind::ty::<Bar>().factory(bar_factory("a")).instance(bar_instance("b")),
        Bind::ty::<Bar>().name("arg").to(bar_factory("a")).factory(bar_factory("b")),
        Bind::ty::<Bar>().instance(bar_instance("a")).arg("extra", 1u8),
        Bind::predicate(|_| true).name("arg").to(Target::implementation::<Bar>()),
    ];
    for spec in specs {
        let err = container.bind(spec).unwrap_err();
        assert!(matches!(err, DiError::AmbiguousBindingSpec(_)));
    }
    assert_eq!(container.registered_count(), 0);
}
