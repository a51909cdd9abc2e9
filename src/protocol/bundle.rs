use crate::base::port::{link_with_depth, InputPort, OutputPort, Port};
use crate::protocol::beats::{AxReq, BResp, RBeat, WBeat};

/// The five channels of a port that receives requests, i.e. the side of a component that a
/// requester plugs into.
#[derive(Debug, Default)]
pub struct SlavePort {
    pub aw: Port<InputPort, AxReq>,
    pub w: Port<InputPort, WBeat>,
    pub b: Port<OutputPort, BResp>,
    pub ar: Port<InputPort, AxReq>,
    pub r: Port<OutputPort, RBeat>,
}

/// The five channels of a port that issues requests, i.e. the side of a component that a
/// responder plugs into.
#[derive(Debug, Default)]
pub struct MasterPort {
    pub aw: Port<OutputPort, AxReq>,
    pub w: Port<OutputPort, WBeat>,
    pub b: Port<InputPort, BResp>,
    pub ar: Port<OutputPort, AxReq>,
    pub r: Port<InputPort, RBeat>,
}

/// Wire every channel of `master` to the matching channel of `slave`, each channel `depth`
/// payloads deep.
pub fn connect(master: &mut MasterPort, slave: &mut SlavePort, depth: usize) {
    _ = link_with_depth(&mut slave.aw, &mut master.aw, depth);
    _ = link_with_depth(&mut slave.w, &mut master.w, depth);
    _ = link_with_depth(&mut master.b, &mut slave.b, depth);
    _ = link_with_depth(&mut slave.ar, &mut master.ar, depth);
    _ = link_with_depth(&mut master.r, &mut slave.r, depth);
}

