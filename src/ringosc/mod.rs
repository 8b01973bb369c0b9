//! Ring oscillator layout generators.
//!
//! The oscillator is the analog core of the temperature sensor: a
//! NAND gate and an even number of inverters closed into a loop, so
//! that driving the enable input high starts the oscillation.

use atoll::route::{GreedyRouter, ViaMaker};
use atoll::{IoBuilder, Orientation, Tile, TileBuilder};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::marker::PhantomData;
use substrate::arcstr;
use substrate::arcstr::ArcStr;
use substrate::block::Block;
use substrate::error::Result;
use substrate::geometry::align::AlignMode;
use substrate::io::{InOut, Input, Io, MosIo, MosIoSchematic, Output, Signal};
use substrate::layout::ExportsLayoutData;
use substrate::pdk::Pdk;
use substrate::schematic::schema::Schema;
use substrate::schematic::ExportsNestedData;

/// The IO of a tap.
#[derive(Default, Debug, Clone, Copy, Io)]
pub struct TapIo {
    /// The tap contact.
    pub x: InOut<Signal>,
}

/// The kind of tile.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum TileKind {
    /// An n-type tile.
    N,
    /// A p-type tile.
    P,
}

/// MOS tile parameters.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct MosTileParams {
    /// The kind of MOS device.
    pub kind: TileKind,
    /// The MOS device width.
    pub w: i64,
}

impl MosTileParams {
    /// Creates a new [`MosTileParams`].
    pub fn new(kind: TileKind, w: i64) -> Self {
        Self { kind, w }
    }
}

/// Tap tile parameters.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct TapTileParams {
    /// The kind of tap.
    pub kind: TileKind,
    /// Number of MOS devices this tap must span.
    pub mos_span: i64,
}

impl TapTileParams {
    /// Creates a new [`TapTileParams`].
    pub fn new(kind: TileKind, mos_span: i64) -> Self {
        Self { kind, mos_span }
    }
}

/// The interface to an inverter.
#[derive(Debug, Default, Clone, Io)]
pub struct InverterIo {
    /// The inverter input.
    pub din: Input<Signal>,
    /// The inverted output.
    pub dout: Output<Signal>,
    /// The VDD rail.
    pub vdd: InOut<Signal>,
    /// The VSS rail.
    pub vss: InOut<Signal>,
}

/// The interface to a 2-input NAND gate.
#[derive(Debug, Default, Clone, Io)]
pub struct Nand2Io {
    /// The first input.
    pub a: Input<Signal>,
    /// The second input.
    pub b: Input<Signal>,
    /// The output.
    pub y: Output<Signal>,
    /// The VDD rail.
    pub vdd: InOut<Signal>,
    /// The VSS rail.
    pub vss: InOut<Signal>,
}

/// The interface to a ring oscillator.
#[derive(Debug, Default, Clone, Io)]
pub struct RingOscIo {
    /// The oscillator enable.
    pub en: Input<Signal>,
    /// The oscillator output.
    pub dout: Output<Signal>,
    /// The VDD rail.
    pub vdd: InOut<Signal>,
    /// The VSS rail.
    pub vss: InOut<Signal>,
}

/// The parameters of the [`Inverter`] layout generator.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct InverterParams {
    /// The width of the NMOS.
    pub nmos_w: i64,
    /// The width of the PMOS.
    pub pmos_w: i64,
}

/// The parameters of the [`Nand2`] layout generator.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct Nand2Params {
    /// The width of each NMOS in the pull-down stack.
    pub nmos_w: i64,
    /// The width of each PMOS in the pull-up pair.
    pub pmos_w: i64,
}

/// The parameters of the [`RingOsc`] layout generator.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct RingOscParams {
    /// The number of inverter stages.
    ///
    /// Must be even; the NAND gate supplies the odd inversion that
    /// makes the ring oscillate.
    pub ninv: i64,
    /// Inverter stage parameters.
    pub inv: InverterParams,
    /// Enable NAND parameters.
    pub nand: Nand2Params,
}

/// A PDK-specific implementation of the ring oscillator tiles.
pub trait RingOscImpl<PDK: Pdk + Schema> {
    /// The single-MOS tile.
    type MosTile: Tile<PDK> + Block<Io = MosIo> + Clone;
    /// The tap tile for biasing wells and substrate.
    type TapTile: Tile<PDK> + Block<Io = TapIo> + Clone;
    /// The via maker handed to the router.
    type ViaMaker: ViaMaker<PDK>;

    /// Creates a MOS tile with the given parameters.
    fn mos(params: MosTileParams) -> Self::MosTile;
    /// Creates a tap tile with the given parameters.
    fn tap(params: TapTileParams) -> Self::TapTile;
    /// Creates a via maker.
    fn via_maker() -> Self::ViaMaker;
    /// Additional layout hooks to run after tile generation.
    fn post_layout_hooks(_cell: &mut TileBuilder<'_, PDK>) -> Result<()> {
        Ok(())
    }
}

/// An inverter stage.
///
/// Standalone inverters are anonymous; inverters created through
/// [`Inverter::ring_stage`] carry their stage index in the generated
/// cell name so ring netlists stay readable.
#[derive_where::derive_where(Copy, Clone, Debug, Hash, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
pub struct Inverter<T> {
    params: InverterParams,
    stage: Option<i64>,
    #[serde(bound(deserialize = ""))]
    phantom: PhantomData<fn() -> T>,
}

impl<T> Inverter<T> {
    /// Creates a new [`Inverter`].
    pub fn new(params: InverterParams) -> Self {
        Self {
            params,
            stage: None,
            phantom: PhantomData,
        }
    }

    /// Creates the inverter for ring stage `stage`.
    pub fn ring_stage(params: InverterParams, stage: i64) -> Self {
        Self {
            params,
            stage: Some(stage),
            phantom: PhantomData,
        }
    }
}

impl<T: Any> Block for Inverter<T> {
    type Io = InverterIo;

    fn id() -> ArcStr {
        arcstr::literal!("inverter")
    }

    fn name(&self) -> ArcStr {
        match self.stage {
            Some(stage) => arcstr::format!("ring_stage_{stage}"),
            None => arcstr::literal!("inverter"),
        }
    }

    fn io(&self) -> Self::Io {
        Default::default()
    }
}

impl<T: Any> ExportsNestedData for Inverter<T> {
    type NestedData = ();
}

impl<T: Any> ExportsLayoutData for Inverter<T> {
    type LayoutData = ();
}

impl<PDK: Pdk + Schema + Sized, T: RingOscImpl<PDK> + Any> Tile<PDK> for Inverter<T> {
    fn tile<'a>(
        &self,
        io: IoBuilder<'a, Self>,
        cell: &mut TileBuilder<'a, PDK>,
    ) -> substrate::error::Result<(
        <Self as ExportsNestedData>::NestedData,
        <Self as ExportsLayoutData>::LayoutData,
    )> {
        // The switching net sits on the drain; the MOS tile gives the
        // drain the outer pair of contacts.
        let mut pmos = cell.generate_connected(
            T::mos(MosTileParams::new(TileKind::P, self.params.pmos_w)),
            MosIoSchematic {
                d: io.schematic.dout,
                g: io.schematic.din,
                s: io.schematic.vdd,
                b: io.schematic.vdd,
            },
        );
        let mut nmos = cell
            .generate_connected(
                T::mos(MosTileParams::new(TileKind::N, self.params.nmos_w)),
                MosIoSchematic {
                    d: io.schematic.dout,
                    g: io.schematic.din,
                    s: io.schematic.vss,
                    b: io.schematic.vss,
                },
            )
            .orient(Orientation::R180);

        let mut ptap = cell.generate(T::tap(TapTileParams::new(TileKind::P, 1)));
        let ntap = cell.generate(T::tap(TapTileParams::new(TileKind::N, 1)));
        cell.connect(ptap.io().x, io.schematic.vss);
        cell.connect(ntap.io().x, io.schematic.vdd);

        let mut prev = ntap.lcm_bounds();

        for mos in [&mut pmos, &mut nmos] {
            mos.align_rect_mut(prev, AlignMode::Left, 0);
            mos.align_rect_mut(prev, AlignMode::Beneath, 0);
            prev = mos.lcm_bounds();
        }

        ptap.align_rect_mut(prev, AlignMode::Left, 0);
        ptap.align_rect_mut(prev, AlignMode::Beneath, 0);

        let pmos = cell.draw(pmos)?;
        let nmos = cell.draw(nmos)?;
        let ntap = cell.draw(ntap)?;
        let ptap = cell.draw(ptap)?;

        cell.set_top_layer(1);
        cell.set_router(GreedyRouter::new());
        cell.set_via_maker(T::via_maker());

        io.layout.din.merge(pmos.layout.io().g);
        io.layout.din.merge(nmos.layout.io().g);
        io.layout.dout.merge(pmos.layout.io().d);
        io.layout.dout.merge(nmos.layout.io().d);
        io.layout.vdd.merge(ntap.layout.io().x);
        io.layout.vss.merge(ptap.layout.io().x);

        T::post_layout_hooks(cell)?;

        Ok(((), ()))
    }
}

/// A 2-input NAND gate.
#[derive_where::derive_where(Copy, Clone, Debug, Hash, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
pub struct Nand2<T>(
    Nand2Params,
    #[serde(bound(deserialize = ""))] PhantomData<fn() -> T>,
);

impl<T> Nand2<T> {
    /// Creates a new [`Nand2`].
    pub fn new(params: Nand2Params) -> Self {
        Self(params, PhantomData)
    }
}

impl<T: Any> Block for Nand2<T> {
    type Io = Nand2Io;

    fn id() -> ArcStr {
        arcstr::literal!("nand2")
    }

    fn name(&self) -> ArcStr {
        arcstr::literal!("nand2")
    }

    fn io(&self) -> Self::Io {
        Default::default()
    }
}

impl<T: Any> ExportsNestedData for Nand2<T> {
    type NestedData = ();
}

impl<T: Any> ExportsLayoutData for Nand2<T> {
    type LayoutData = ();
}

impl<PDK: Pdk + Schema + Sized, T: RingOscImpl<PDK> + Any> Tile<PDK> for Nand2<T> {
    fn tile<'a>(
        &self,
        io: IoBuilder<'a, Self>,
        cell: &mut TileBuilder<'a, PDK>,
    ) -> substrate::error::Result<(
        <Self as ExportsNestedData>::NestedData,
        <Self as ExportsLayoutData>::LayoutData,
    )> {
        let nmos_params = MosTileParams::new(TileKind::N, self.0.nmos_w);
        let pmos_params = MosTileParams::new(TileKind::P, self.0.pmos_w);

        // Internal node of the series pull-down stack.
        let int = cell.signal("int", Signal::new());

        let mut pmos_a = cell.generate_connected(
            T::mos(pmos_params),
            MosIoSchematic {
                d: io.schematic.y,
                g: io.schematic.a,
                s: io.schematic.vdd,
                b: io.schematic.vdd,
            },
        );
        let mut pmos_b = cell.generate_connected(
            T::mos(pmos_params),
            MosIoSchematic {
                d: io.schematic.y,
                g: io.schematic.b,
                s: io.schematic.vdd,
                b: io.schematic.vdd,
            },
        );
        let mut nmos_a = cell
            .generate_connected(
                T::mos(nmos_params),
                MosIoSchematic {
                    d: io.schematic.y,
                    g: io.schematic.a,
                    s: int,
                    b: io.schematic.vss,
                },
            )
            .orient(Orientation::R180);
        let mut nmos_b = cell
            .generate_connected(
                T::mos(nmos_params),
                MosIoSchematic {
                    d: int,
                    g: io.schematic.b,
                    s: io.schematic.vss,
                    b: io.schematic.vss,
                },
            )
            .orient(Orientation::R180);

        let mut ptap = cell.generate(T::tap(TapTileParams::new(TileKind::P, 1)));
        let ntap = cell.generate(T::tap(TapTileParams::new(TileKind::N, 1)));
        cell.connect(ptap.io().x, io.schematic.vss);
        cell.connect(ntap.io().x, io.schematic.vdd);

        let mut prev = ntap.lcm_bounds();

        for mos in [&mut pmos_a, &mut pmos_b, &mut nmos_a, &mut nmos_b] {
            mos.align_rect_mut(prev, AlignMode::Left, 0);
            mos.align_rect_mut(prev, AlignMode::Beneath, 0);
            prev = mos.lcm_bounds();
        }

        ptap.align_rect_mut(prev, AlignMode::Left, 0);
        ptap.align_rect_mut(prev, AlignMode::Beneath, 0);

        let pmos_a = cell.draw(pmos_a)?;
        let pmos_b = cell.draw(pmos_b)?;
        let nmos_a = cell.draw(nmos_a)?;
        let nmos_b = cell.draw(nmos_b)?;
        let ptap = cell.draw(ptap)?;
        let ntap = cell.draw(ntap)?;

        cell.set_top_layer(1);
        cell.set_router(GreedyRouter::new());
        cell.set_via_maker(T::via_maker());

        io.layout.a.merge(pmos_a.layout.io().g);
        io.layout.a.merge(nmos_a.layout.io().g);
        io.layout.b.merge(pmos_b.layout.io().g);
        io.layout.b.merge(nmos_b.layout.io().g);
        io.layout.y.merge(pmos_a.layout.io().d);
        io.layout.y.merge(pmos_b.layout.io().d);
        io.layout.y.merge(nmos_a.layout.io().d);
        io.layout.vdd.merge(ntap.layout.io().x);
        io.layout.vss.merge(ptap.layout.io().x);

        T::post_layout_hooks(cell)?;

        Ok(((), ()))
    }
}

/// A NAND-gated ring oscillator.
///
/// Layout assumes that PDK layer stack has a vertical layer 0.
#[derive_where::derive_where(Copy, Clone, Debug, Hash, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
pub struct RingOsc<T>(
    RingOscParams,
    #[serde(bound(deserialize = ""))] PhantomData<fn() -> T>,
);

impl<T> RingOsc<T> {
    /// Creates a new [`RingOsc`].
    pub fn new(params: RingOscParams) -> Self {
        Self(params, PhantomData)
    }
}

impl<T: Any> Block for RingOsc<T> {
    type Io = RingOscIo;

    fn id() -> ArcStr {
        arcstr::literal!("ring_osc")
    }

    fn name(&self) -> ArcStr {
        arcstr::format!("ring_osc_{}", self.0.ninv)
    }

    fn io(&self) -> Self::Io {
        Default::default()
    }
}

impl<T: Any> ExportsNestedData for RingOsc<T> {
    type NestedData = ();
}

impl<T: Any> ExportsLayoutData for RingOsc<T> {
    type LayoutData = ();
}

impl<PDK: Pdk + Schema + Sized, T: RingOscImpl<PDK> + Any> Tile<PDK> for RingOsc<T> {
    fn tile<'a>(
        &self,
        io: IoBuilder<'a, Self>,
        cell: &mut TileBuilder<'a, PDK>,
    ) -> substrate::error::Result<(
        <Self as ExportsNestedData>::NestedData,
        <Self as ExportsLayoutData>::LayoutData,
    )> {
        let ninv = self.0.ninv;
        assert!(
            ninv > 0 && ninv % 2 == 0,
            "ring oscillator requires a positive, even number of inverters"
        );

        // n0 is the NAND output; ni is the output of stage i. The last
        // stage drives the oscillator output port, which closes the
        // loop through the NAND's second input.
        let mut nodes = (0..ninv)
            .map(|i| cell.signal(arcstr::format!("n{i}"), Signal::new()))
            .collect::<Vec<_>>();
        nodes.push(io.schematic.dout);

        let nand = cell.generate_connected(
            Nand2::<T>::new(self.0.nand),
            Nand2IoSchematic {
                a: io.schematic.en,
                b: nodes[ninv as usize],
                y: nodes[0],
                vdd: io.schematic.vdd,
                vss: io.schematic.vss,
            },
        );

        let mut prev = nand.lcm_bounds();
        let mut invs = Vec::with_capacity(ninv as usize);
        for i in 0..ninv as usize {
            let mut inv = cell.generate_connected(
                Inverter::<T>::ring_stage(self.0.inv, i as i64),
                InverterIoSchematic {
                    din: nodes[i],
                    dout: nodes[i + 1],
                    vdd: io.schematic.vdd,
                    vss: io.schematic.vss,
                },
            );
            inv.align_rect_mut(prev, AlignMode::Bottom, 0);
            inv.align_rect_mut(prev, AlignMode::ToTheRight, 0);
            prev = inv.lcm_bounds();
            invs.push(inv);
        }

        let nand = cell.draw(nand)?;
        let invs = invs
            .into_iter()
            .map(|inst| cell.draw(inst))
            .collect::<Result<Vec<_>>>()?;

        cell.set_top_layer(2);
        cell.set_router(GreedyRouter::new());
        cell.set_via_maker(T::via_maker());

        io.layout.en.merge(nand.layout.io().a);
        io.layout.dout.merge(invs[ninv as usize - 1].layout.io().dout);
        io.layout.vdd.merge(nand.layout.io().vdd);
        io.layout.vss.merge(nand.layout.io().vss);
        for inv in &invs {
            io.layout.vdd.merge(inv.layout.io().vdd);
            io.layout.vss.merge(inv.layout.io().vss);
        }

        T::post_layout_hooks(cell)?;

        Ok(((), ()))
    }
}
