//! SKY130-specific implementations.

use crate::ringosc::{MosTileParams, RingOscImpl, TapIo, TapTileParams, TileKind};
use atoll::route::GreedyRouter;
use atoll::{IoBuilder, Tile, TileBuilder};
use serde::{Deserialize, Serialize};
use sky130pdk::atoll::{MosLength, NmosTile, NtapTile, PmosTile, PtapTile, Sky130ViaMaker};
use sky130pdk::Sky130Pdk;
use substrate::arcstr;
use substrate::arcstr::ArcStr;
use substrate::block::Block;
use substrate::io::MosIo;
use substrate::layout::ExportsLayoutData;
use substrate::schematic::ExportsNestedData;

/// A SKY130 implementation of the temperature sensor generators.
pub struct Sky130Tempsense;

impl RingOscImpl<Sky130Pdk> for Sky130Tempsense {
    type MosTile = TwoFingerMosTile;
    type TapTile = TapTile;
    type ViaMaker = Sky130ViaMaker;

    fn mos(params: MosTileParams) -> Self::MosTile {
        TwoFingerMosTile::new(params.w, MosLength::L150, params.kind)
    }
    fn tap(params: TapTileParams) -> Self::TapTile {
        TapTile::new(params)
    }
    fn via_maker() -> Self::ViaMaker {
        Sky130ViaMaker
    }
}

/// A two-finger MOS tile.
#[derive(Serialize, Deserialize, Block, Copy, Clone, Debug, Hash, PartialEq, Eq)]
#[substrate(io = "MosIo")]
pub struct TwoFingerMosTile {
    w: i64,
    l: MosLength,
    kind: TileKind,
}

impl TwoFingerMosTile {
    /// Creates a new [`TwoFingerMosTile`].
    pub fn new(w: i64, l: MosLength, kind: TileKind) -> Self {
        Self { w, l, kind }
    }
}

impl ExportsNestedData for TwoFingerMosTile {
    type NestedData = ();
}

impl ExportsLayoutData for TwoFingerMosTile {
    type LayoutData = ();
}

impl Tile<Sky130Pdk> for TwoFingerMosTile {
    fn tile<'a>(
        &self,
        io: IoBuilder<'a, Self>,
        cell: &mut TileBuilder<'a, Sky130Pdk>,
    ) -> substrate::error::Result<(
        <Self as ExportsNestedData>::NestedData,
        <Self as ExportsLayoutData>::LayoutData,
    )> {
        cell.flatten();
        // Both fingers share the gate. The drain takes the outer pair
        // of source/drain contacts and the source the center one; the
        // inverter and NAND generators put the switching net on d.
        match self.kind {
            TileKind::N => {
                let nmos = cell.generate_primitive(NmosTile::new(self.w, self.l, 2));
                cell.connect(nmos.io().g[0], io.schematic.g);
                cell.connect(nmos.io().b, io.schematic.b);
                cell.connect(nmos.io().sd[0], io.schematic.d);
                cell.connect(nmos.io().sd[1], io.schematic.s);
                cell.connect(nmos.io().sd[2], io.schematic.d);
                let nmos = cell.draw(nmos)?;
                io.layout.g.merge(nmos.layout.io().g[0].clone());
                io.layout.d.merge(nmos.layout.io().sd[0].clone());
                io.layout.s.merge(nmos.layout.io().sd[1].clone());
                io.layout.d.merge(nmos.layout.io().sd[2].clone());
                io.layout.b.merge(nmos.layout.io().b);
            }
            TileKind::P => {
                let pmos = cell.generate_primitive(PmosTile::new(self.w, self.l, 2));
                cell.connect(pmos.io().g[0], io.schematic.g);
                cell.connect(pmos.io().b, io.schematic.b);
                cell.connect(pmos.io().sd[0], io.schematic.d);
                cell.connect(pmos.io().sd[1], io.schematic.s);
                cell.connect(pmos.io().sd[2], io.schematic.d);
                let pmos = cell.draw(pmos)?;
                io.layout.g.merge(pmos.layout.io().g[0].clone());
                io.layout.d.merge(pmos.layout.io().sd[0].clone());
                io.layout.s.merge(pmos.layout.io().sd[1].clone());
                io.layout.d.merge(pmos.layout.io().sd[2].clone());
                io.layout.b.merge(pmos.layout.io().b);
            }
        }

        cell.set_top_layer(1);
        cell.set_router(GreedyRouter::new());
        cell.set_via_maker(Sky130ViaMaker);

        Ok(((), ()))
    }
}

/// A tile containing an N or P tap for biasing the N-well or the
/// P-substrate, sized to span a run of MOS tiles.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct TapTile {
    kind: TileKind,
    mos_span: i64,
}

impl TapTile {
    /// Creates a new [`TapTile`].
    pub fn new(params: TapTileParams) -> Self {
        Self {
            kind: params.kind,
            mos_span: params.mos_span,
        }
    }
}

impl Block for TapTile {
    type Io = TapIo;

    fn id() -> ArcStr {
        arcstr::literal!("tap_tile")
    }

    fn name(&self) -> ArcStr {
        arcstr::format!(
            "{}tap",
            match self.kind {
                TileKind::N => "n",
                TileKind::P => "p",
            }
        )
    }

    fn io(&self) -> Self::Io {
        Default::default()
    }
}

impl ExportsNestedData for TapTile {
    type NestedData = ();
}

impl ExportsLayoutData for TapTile {
    type LayoutData = ();
}

impl Tile<Sky130Pdk> for TapTile {
    fn tile<'a>(
        &self,
        io: IoBuilder<'a, Self>,
        cell: &mut TileBuilder<'a, Sky130Pdk>,
    ) -> substrate::error::Result<(
        <Self as ExportsNestedData>::NestedData,
        <Self as ExportsLayoutData>::LayoutData,
    )> {
        cell.flatten();
        // Track width matches the pitch of the two-finger MOS tiles
        // this tap spans.
        let xtracks = 4 * self.mos_span - 1;
        match self.kind {
            TileKind::N => {
                let inst = cell.generate_primitive(NtapTile::new(xtracks, 2));
                cell.connect(io.schematic.x, inst.io().vpb);
                let inst = cell.draw(inst)?;
                io.layout.x.merge(inst.layout.io().vpb);
            }
            TileKind::P => {
                let inst = cell.generate_primitive(PtapTile::new(xtracks, 2));
                cell.connect(io.schematic.x, inst.io().vnb);
                let inst = cell.draw(inst)?;
                io.layout.x.merge(inst.layout.io().vnb);
            }
        }
        cell.set_router(GreedyRouter::new());
        Ok(((), ()))
    }
}

#[cfg(test)]
mod tests {
    use crate::ringosc::{
        Inverter, InverterParams, Nand2Params, RingOsc, RingOscParams, TileKind,
    };
    use crate::sky130_open_ctx;
    use crate::tech::sky130::{Sky130Tempsense, TwoFingerMosTile};
    use atoll::TileWrapper;
    use sky130pdk::atoll::MosLength;
    use sky130pdk::Sky130OpenSchema;
    use spice::netlist::NetlistOptions;
    use spice::Spice;
    use std::path::PathBuf;
    use substrate::schematic::netlist::ConvertibleNetlister;

    #[test]
    fn sky130_nmos_gds() {
        let work_dir = PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/build/nmos_gds"));
        let gds_path = work_dir.join("layout.gds");
        let ctx = sky130_open_ctx();

        let block = TileWrapper::new(TwoFingerMosTile::new(1_000, MosLength::L150, TileKind::N));

        ctx.write_layout(block, gds_path)
            .expect("failed to write layout");
    }

    #[test]
    fn sky130_inverter_lvs() {
        let work_dir = PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/build/inverter_lvs"));
        let gds_path = work_dir.join("layout.gds");
        let netlist_path = work_dir.join("netlist.sp");
        let ctx = sky130_open_ctx();

        let block = TileWrapper::new(Inverter::<Sky130Tempsense>::new(InverterParams {
            nmos_w: 1_000,
            pmos_w: 1_400,
        }));

        let scir = ctx
            .export_scir(block)
            .unwrap()
            .scir
            .convert_schema::<Sky130OpenSchema>()
            .unwrap()
            .convert_schema::<Spice>()
            .unwrap()
            .build()
            .unwrap();
        Spice
            .write_scir_netlist_to_file(&scir, netlist_path, NetlistOptions::default())
            .expect("failed to write netlist");

        ctx.write_layout(block, gds_path)
            .expect("failed to write layout");
    }

    #[test]
    fn sky130_ring_osc_lvs() {
        let work_dir = PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/build/ring_osc_lvs"));
        let gds_path = work_dir.join("layout.gds");
        let netlist_path = work_dir.join("netlist.sp");
        let ctx = sky130_open_ctx();

        let block = TileWrapper::new(RingOsc::<Sky130Tempsense>::new(RingOscParams {
            ninv: 6,
            inv: InverterParams {
                nmos_w: 1_000,
                pmos_w: 1_400,
            },
            nand: Nand2Params {
                nmos_w: 1_000,
                pmos_w: 1_400,
            },
        }));

        let scir = ctx
            .export_scir(block)
            .unwrap()
            .scir
            .convert_schema::<Sky130OpenSchema>()
            .unwrap()
            .convert_schema::<Spice>()
            .unwrap()
            .build()
            .unwrap();
        Spice
            .write_scir_netlist_to_file(&scir, netlist_path, NetlistOptions::default())
            .expect("failed to write netlist");

        ctx.write_layout(block, gds_path)
            .expect("failed to write layout");
    }
}
