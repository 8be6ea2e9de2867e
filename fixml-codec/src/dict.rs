//! Perfect-hash mapping from XML local names to internal tokens.
//!
//! Grounded on the tag-dictionary pattern used by FIX engines that need a
//! fast, allocation-free name lookup on the hot decode path (e.g. `phf`-based
//! field tables in FIX parsers); case-sensitive, unknown names map to the
//! `Unknown` sentinel rather than erroring, since unrecognized elements and
//! attributes are ignored, not rejected (see `fixml_codec::decode`).
//!
//! `Txt` carries the owning portfolio mnemonic on `SecDef*` elements; no
//! other attribute in this table plays that role.

/// Tokens for the FIXML element names this engine understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElemTok {
    Fixml,
    Batch,
    ReqForPoss,
    ReqForPossAck,
    PosRpt,
    RgstInstrctns,
    RgstInstrctnsRsp,
    RgDtl,
    Pty,
    Sub,
    Instrmt,
    Qty,
    Amt,
    SecDef,
    SecDefReq,
    SecDefUpd,
    AllocInstrctn,
    AllocInstrctnAck,
    ApplMsgReq,
    ApplMsgReqAck,
    /// `AppIDReqGrp`, the repeating group nested in `ApplMsgReq*`.
    AppIdReqGrp,
    Unknown,
}

/// Tokens for the FIXML attribute names this engine understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttrTok {
    Id,
    R,
    S,
    Src,
    Sym,
    Typ,
    Long,
    Short,
    BizDt,
    TxnTm,
    TotRpts,
    Rslt,
    Stat,
    ReqTyp,
    ReqId,
    RptId,
    SetSesId,
    QtyDt,
    RegStat,
    TransTyp,
    RefId,
    RefApplId,
    Xmlns,
    V,
    /// `Txt`, carrying the owning portfolio mnemonic on `SecDef*` elements.
    Txt,
    Unknown,
}

static ELEMENTS: phf::Map<&'static str, ElemTok> = phf::phf_map! {
    "FIXML" => ElemTok::Fixml,
    "Batch" => ElemTok::Batch,
    "ReqForPoss" => ElemTok::ReqForPoss,
    "ReqForPossAck" => ElemTok::ReqForPossAck,
    "PosRpt" => ElemTok::PosRpt,
    "RgstInstrctns" => ElemTok::RgstInstrctns,
    "RgstInstrctnsRsp" => ElemTok::RgstInstrctnsRsp,
    "RgDtl" => ElemTok::RgDtl,
    "Pty" => ElemTok::Pty,
    "Sub" => ElemTok::Sub,
    "Instrmt" => ElemTok::Instrmt,
    "Qty" => ElemTok::Qty,
    "Amt" => ElemTok::Amt,
    "SecDef" => ElemTok::SecDef,
    "SecDefReq" => ElemTok::SecDefReq,
    "SecDefUpd" => ElemTok::SecDefUpd,
    "AllocInstrctn" => ElemTok::AllocInstrctn,
    "AllocInstrctnAck" => ElemTok::AllocInstrctnAck,
    "ApplMsgReq" => ElemTok::ApplMsgReq,
    "ApplMsgReqAck" => ElemTok::ApplMsgReqAck,
    "AppIDReqGrp" => ElemTok::AppIdReqGrp,
};

static ATTRS: phf::Map<&'static str, AttrTok> = phf::phf_map! {
    "ID" => AttrTok::Id,
    "R" => AttrTok::R,
    "S" => AttrTok::S,
    "Src" => AttrTok::Src,
    "Sym" => AttrTok::Sym,
    "Typ" => AttrTok::Typ,
    "Long" => AttrTok::Long,
    "Short" => AttrTok::Short,
    "BizDt" => AttrTok::BizDt,
    "TxnTm" => AttrTok::TxnTm,
    "TotRpts" => AttrTok::TotRpts,
    "Rslt" => AttrTok::Rslt,
    "Stat" => AttrTok::Stat,
    "ReqTyp" => AttrTok::ReqTyp,
    "ReqID" => AttrTok::ReqId,
    "RptID" => AttrTok::RptId,
    "SetSesID" => AttrTok::SetSesId,
    "QtyDt" => AttrTok::QtyDt,
    "RegStat" => AttrTok::RegStat,
    "TransTyp" => AttrTok::TransTyp,
    "RefID" => AttrTok::RefId,
    "RefApplID" => AttrTok::RefApplId,
    "xmlns" => AttrTok::Xmlns,
    "v" => AttrTok::V,
    "Txt" => AttrTok::Txt,
};

/// Looks up an element's local name. Unknown names yield [`ElemTok::Unknown`].
pub fn elem(local_name: &str) -> ElemTok {
    ELEMENTS.get(local_name).copied().unwrap_or(ElemTok::Unknown)
}

/// Looks up an attribute's local name. Unknown names yield [`AttrTok::Unknown`].
pub fn attr(local_name: &str) -> AttrTok {
    ATTRS.get(local_name).copied().unwrap_or(AttrTok::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_elements_resolve() {
        assert_eq!(elem("FIXML"), ElemTok::Fixml);
        assert_eq!(elem("PosRpt"), ElemTok::PosRpt);
    }

    #[test]
    fn unknown_element_is_sentinel() {
        assert_eq!(elem("Frobnicate"), ElemTok::Unknown);
    }

    #[test]
    fn case_sensitive() {
        assert_eq!(elem("fixml"), ElemTok::Unknown);
    }

    #[test]
    fn known_and_unknown_attrs() {
        assert_eq!(attr("BizDt"), AttrTok::BizDt);
        assert_eq!(attr("bizdt"), AttrTok::Unknown);
    }
}
