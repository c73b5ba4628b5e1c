use std::collections::HashSet;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use mfgplan_core::{MenuId, PermissionId};
use mfgplan_menus::{Menu, build_menu_tree};

/// Balanced-ish forest: every node's parent is `id / fanout`, a third of the
/// nodes gated by one of four permissions.
fn forest(size: i64, fanout: i64) -> Vec<Menu> {
    (1..=size)
        .map(|id| {
            let mut menu = Menu::new(MenuId::new(id), format!("menu-{id}")).ordered((id % 7) as i32);
            if id > fanout {
                menu = menu.under(MenuId::new(id / fanout));
            }
            if id % 3 == 0 {
                menu = menu.gated_by(PermissionId::new(id % 4 + 1));
            }
            menu
        })
        .collect()
}

fn bench_build_menu_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_menu_tree");
    let held: HashSet<PermissionId> = [PermissionId::new(1), PermissionId::new(2)].into();

    for size in [100i64, 1_000, 10_000] {
        let menus = forest(size, 8);
        group.bench_with_input(BenchmarkId::new("scoped", size), &menus, |b, menus| {
            b.iter(|| build_menu_tree(black_box(menus), black_box(&held), false))
        });
        group.bench_with_input(BenchmarkId::new("admin", size), &menus, |b, menus| {
            b.iter(|| build_menu_tree(black_box(menus), black_box(&held), true))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_build_menu_tree);
criterion_main!(benches);
