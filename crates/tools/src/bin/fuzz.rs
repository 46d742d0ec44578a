use anyhow::Result;
use clap::Parser;
use engine::world::WorldGrid;
use engine::{
    Dir, Engine, EngineConfig, EntityKind, InputSnapshot, Pos, StopReason, TileFlags,
};
use rand_chacha::{
    ChaCha8Rng,
    rand_core::{Rng, SeedableRng},
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = 42)]
    seed: u64,
    #[arg(short, long, default_value_t = 1000)]
    ticks: u32,
}

/// Walled arena with a pillar field and one of every walker kind.
fn arena(seed: u64) -> Engine {
    let mut world = WorldGrid::new(20, 20);
    for x in 0..20 {
        world.set_tile_flags(Pos { y: 0, x }, TileFlags::SOLID);
        world.set_tile_flags(Pos { y: 19, x }, TileFlags::SOLID);
    }
    for y in 0..20 {
        world.set_tile_flags(Pos { y, x: 0 }, TileFlags::SOLID);
        world.set_tile_flags(Pos { y, x: 19 }, TileFlags::SOLID);
    }
    for (y, x) in [(5, 5), (5, 14), (14, 5), (14, 14), (10, 10)] {
        world.set_tile_flags(Pos { y, x }, TileFlags::SOLID);
    }

    let mut engine = Engine::new(seed, EngineConfig::default(), world);
    engine.spawn(EntityKind::Player, Dir::Down, Pos { y: 2, x: 2 }, 1);
    engine.spawn(EntityKind::TurnBot, Dir::Right, Pos { y: 3, x: 10 }, 1);
    engine.spawn(EntityKind::RightBot, Dir::Right, Pos { y: 17, x: 2 }, 1);
    engine.spawn(EntityKind::OmniBot, Dir::Left, Pos { y: 10, x: 17 }, 1);
    engine.spawn(EntityKind::FourFirer, Dir::Up, Pos { y: 12, x: 12 }, 1);
    engine.spawn(EntityKind::PushBot, Dir::Right, Pos { y: 8, x: 2 }, 1);
    engine.spawn(EntityKind::Crate, Dir::None, Pos { y: 8, x: 6 }, 1);
    engine.spawn(EntityKind::MaintBot, Dir::Down, Pos { y: 15, x: 10 }, 1);
    engine.spawn(EntityKind::DeadEye, Dir::Up, Pos { y: 17, x: 17 }, 1);
    engine
}

fn random_input(rng: &mut ChaCha8Rng) -> InputSnapshot {
    let dir = match rng.next_u64() % 8 {
        0 => Dir::Up,
        1 => Dir::Down,
        2 => Dir::Left,
        3 => Dir::Right,
        _ => Dir::None,
    };
    InputSnapshot { dir, ..Default::default() }
}

fn main() -> Result<()> {
    let args = Args::parse();

    println!("Starting fuzz harness on seed {} for max {} ticks...", args.seed, args.ticks);
    let mut engine = arena(args.seed);
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);

    let mut total_ticks = 0;
    while total_ticks < args.ticks {
        let inputs: Vec<InputSnapshot> = (0..10).map(|_| random_input(&mut rng)).collect();
        let result = engine
            .advance(10, &inputs)
            .map_err(|e| anyhow::anyhow!("rule fault during fuzz: {e}"))?;
        total_ticks += result.simulated_ticks;

        match result.stop_reason {
            StopReason::PlayerDead => {
                println!(
                    "Player died ({:?}) after {} ticks",
                    engine.player_dead(),
                    total_ticks
                );
                break;
            }
            StopReason::QuitRequested => break,
            StopReason::BudgetExhausted => {}
        }

        // Invariants: pixel and tile stay consistent, and no walker
        // ever occupies a solid tile.
        let tile_size = engine.config().tile_size;
        for (_, e) in engine.registry().iter() {
            assert_eq!(
                e.tile,
                Pos { y: e.y / tile_size, x: e.x / tile_size },
                "Invariant failed: tile out of sync with pixels"
            );
            if e.kind != EntityKind::Missile {
                assert!(
                    !engine.world().flags_at(e.tile).contains(TileFlags::SOLID),
                    "Invariant failed: {:?} inside a wall",
                    e.kind
                );
            }
        }
    }

    println!("Fuzzing completed successfully. Final hash: {}", engine.snapshot_hash());
    Ok(())
}
