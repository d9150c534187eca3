//! Expression and update cycle benchmarks

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use kryon_databind::*;
use std::cell::RefCell;
use std::rc::Rc;

const EXPRESSIONS: &[&str] = &[
    "count + 1",
    "price * quantity > 100 ? 'bulk' : 'single'",
    "name | to_upper",
    "(a + b) * (c - d) / 2 == ratio && !disabled",
    "total | format(2, true)",
];

struct Row {
    label: String,
    value: i32,
}

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile_expressions", |b| {
        b.iter(|| {
            for source in EXPRESSIONS {
                black_box(DataExpression::compile(black_box(source)).unwrap());
            }
        })
    });
}

fn bench_execute(c: &mut Criterion) {
    let values: Vec<(&str, Variant)> = vec![
        ("count", Variant::Int(41)),
        ("price", Variant::Float(12.5)),
        ("quantity", Variant::Int(10)),
        ("name", Variant::from("kryon")),
        ("a", Variant::Int(1)),
        ("b", Variant::Int(2)),
        ("c", Variant::Int(7)),
        ("d", Variant::Int(3)),
        ("ratio", Variant::Int(6)),
        ("disabled", Variant::Bool(false)),
        ("total", Variant::Float(3.14159)),
    ];

    let mut store = DataStore::default();
    let cells: Vec<_> = values
        .iter()
        .map(|(name, value)| {
            let cell = Rc::new(RefCell::new(value.clone()));
            store.bind_scalar(name, &cell).unwrap();
            cell
        })
        .collect();

    let document = Document::new();
    let expressions: Vec<BoundExpression> = EXPRESSIONS
        .iter()
        .map(|source| BoundExpression::new(source, document.root(), &store, &document).unwrap())
        .collect();

    c.bench_function("execute_expressions", |b| {
        b.iter(|| {
            for expression in &expressions {
                black_box(expression.run(&store).unwrap());
            }
        })
    });
    drop(cells);
}

fn repetition_model(rows: usize) -> (DataModel, Document, Rc<RefCell<Vec<Row>>>) {
    let mut model = DataModel::new("bench");
    model
        .types_mut()
        .register_struct::<Row>()
        .unwrap()
        .register_member("label", |r: &Row| &r.label, |r: &mut Row| &mut r.label)
        .unwrap()
        .register_member("value", |r: &Row| &r.value, |r: &mut Row| &mut r.value)
        .unwrap();
    model.types_mut().register_array::<Vec<Row>>().unwrap();

    let data = Rc::new(RefCell::new(
        (0..rows)
            .map(|i| Row {
                label: format!("Row {}", i),
                value: i as i32,
            })
            .collect::<Vec<_>>(),
    ));
    model.bind("rows", &data).unwrap();

    let mut document = Document::new();
    let template = ElementTemplate::element("li")
        .attribute("data-for", "row : rows")
        .attribute("data-class-odd", "row.value >= 500")
        .child(ElementTemplate::text("{{ row.label }}: {{ row.value }}"));
    let anchor = document.instantiate(&template);
    document.append_child(document.root(), anchor).unwrap();
    model.bind_document(&mut document);

    (model, document, data)
}

fn bench_repetition_update(c: &mut Criterion) {
    c.bench_function("repetition_update_1000_rows", |b| {
        b.iter_batched(
            || repetition_model(1000),
            |(mut model, mut document, data)| {
                black_box(model.update(&mut document));
                drop(data);
            },
            BatchSize::LargeInput,
        )
    });

    let (mut model, mut document, data) = repetition_model(1000);
    model.update(&mut document);
    c.bench_function("dirty_update_1000_rows", |b| {
        b.iter(|| {
            data.borrow_mut()[500].value += 1;
            model.dirty_variable("rows");
            black_box(model.update(&mut document));
        })
    });
}

criterion_group!(benches, bench_compile, bench_execute, bench_repetition_update);
criterion_main!(benches);
