//! PLMN Identity
//!
//! Stored in the 3-byte BCD layout of TS 24.008 §10.5.1.13, so equality is
//! a plain byte comparison. JSON form follows TS 29.571 PlmnId
//! (`{"mcc":"001","mnc":"01"}`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{SbiError, SbiResult};

/// PLMN ID (Public Land Mobile Network Identity)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "PlmnIdJson", into = "PlmnIdJson")]
pub struct PlmnId([u8; 3]);

impl PlmnId {
    /// Build from numeric MCC/MNC; `mnc_len` is 2 or 3 digits
    pub fn new(mcc: u16, mnc: u16, mnc_len: u8) -> SbiResult<Self> {
        if mcc > 999 {
            return Err(SbiError::InvalidParam(format!("MCC {} out of range", mcc)));
        }
        let mnc_max = match mnc_len {
            2 => 99,
            3 => 999,
            _ => {
                return Err(SbiError::InvalidParam(format!(
                    "MNC length {} not 2 or 3",
                    mnc_len
                )))
            }
        };
        if mnc > mnc_max {
            return Err(SbiError::InvalidParam(format!("MNC {} out of range", mnc)));
        }

        let digit = |v: u16, pos: u32| ((v / 10u16.pow(pos)) % 10) as u8;
        let (mnc1, mnc2, mnc3) = if mnc_len == 2 {
            (digit(mnc, 1), digit(mnc, 0), 0x0f)
        } else {
            (digit(mnc, 2), digit(mnc, 1), digit(mnc, 0))
        };

        Ok(PlmnId([
            (digit(mcc, 1) << 4) | digit(mcc, 2),
            (mnc3 << 4) | digit(mcc, 0),
            (mnc2 << 4) | mnc1,
        ]))
    }

    /// Wrap the 3-byte encoded form
    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        PlmnId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }

    pub fn mcc(&self) -> u16 {
        let b = &self.0;
        (b[0] & 0x0f) as u16 * 100 + (b[0] >> 4) as u16 * 10 + (b[1] & 0x0f) as u16
    }

    pub fn mnc(&self) -> u16 {
        let b = &self.0;
        let (mnc1, mnc2) = ((b[2] & 0x0f) as u16, (b[2] >> 4) as u16);
        if self.mnc_len() == 2 {
            mnc1 * 10 + mnc2
        } else {
            mnc1 * 100 + mnc2 * 10 + (b[1] >> 4) as u16
        }
    }

    pub fn mnc_len(&self) -> u8 {
        if self.0[1] >> 4 == 0x0f {
            2
        } else {
            3
        }
    }

    pub fn mcc_string(&self) -> String {
        format!("{:03}", self.mcc())
    }

    pub fn mnc_string(&self) -> String {
        format!("{:0width$}", self.mnc(), width = self.mnc_len() as usize)
    }

    /// 3GPP network domain, e.g. "mnc001.mcc001.3gppnetwork.org"
    pub fn home_network_domain(&self) -> String {
        format!("mnc{:03}.mcc{:03}.3gppnetwork.org", self.mnc(), self.mcc())
    }
}

impl fmt::Display for PlmnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.mcc_string(), self.mnc_string())
    }
}

impl fmt::Debug for PlmnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlmnId({}-{})", self.mcc_string(), self.mnc_string())
    }
}

/// Parses "00101", "001001" or "001-01"
impl FromStr for PlmnId {
    type Err = SbiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (mcc, mnc) = match s.split_once('-') {
            Some((mcc, mnc)) => (mcc, mnc),
            None if s.len() == 5 || s.len() == 6 => s.split_at(3),
            None => return Err(SbiError::InvalidParam(format!("Invalid PLMN ID [{}]", s))),
        };
        PlmnIdJson {
            mcc: mcc.to_string(),
            mnc: mnc.to_string(),
        }
        .try_into()
    }
}

#[derive(Serialize, Deserialize)]
struct PlmnIdJson {
    mcc: String,
    mnc: String,
}

impl TryFrom<PlmnIdJson> for PlmnId {
    type Error = SbiError;

    fn try_from(json: PlmnIdJson) -> Result<Self, Self::Error> {
        let digits = |s: &str, lens: &[usize]| -> SbiResult<u16> {
            if !lens.contains(&s.len()) || !s.bytes().all(|b| b.is_ascii_digit()) {
                return Err(SbiError::InvalidParam(format!("Invalid PLMN digits [{}]", s)));
            }
            s.parse::<u16>()
                .map_err(|e| SbiError::InvalidParam(e.to_string()))
        };
        let mcc = digits(&json.mcc, &[3])?;
        let mnc = digits(&json.mnc, &[2, 3])?;
        PlmnId::new(mcc, mnc, json.mnc.len() as u8)
    }
}

impl From<PlmnId> for PlmnIdJson {
    fn from(plmn_id: PlmnId) -> Self {
        PlmnIdJson {
            mcc: plmn_id.mcc_string(),
            mnc: plmn_id.mnc_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plmn_id_encoding() {
        let plmn = PlmnId::new(1, 1, 2).unwrap();
        assert_eq!(plmn.as_bytes(), &[0x00, 0xf1, 0x10]);
        assert_eq!(plmn.mcc(), 1);
        assert_eq!(plmn.mnc(), 1);
        assert_eq!(plmn.mnc_len(), 2);
        assert_eq!(plmn.to_string(), "00101");

        let plmn = PlmnId::new(310, 410, 3).unwrap();
        assert_eq!(plmn.as_bytes(), &[0x13, 0x00, 0x14]);
        assert_eq!(plmn.mcc(), 310);
        assert_eq!(plmn.mnc(), 410);
        assert_eq!(plmn.to_string(), "310410");
    }

    #[test]
    fn test_home_network_domain() {
        let plmn_id = PlmnId::new(310, 14, 3).unwrap();
        assert_eq!(plmn_id.home_network_domain(), "mnc014.mcc310.3gppnetwork.org");
        let plmn_id = PlmnId::new(1, 1, 2).unwrap();
        assert_eq!(plmn_id.home_network_domain(), "mnc001.mcc001.3gppnetwork.org");
    }

    #[test]
    fn test_plmn_id_mnc_length_matters() {
        let two = PlmnId::new(1, 1, 2).unwrap();
        let three = PlmnId::new(1, 1, 3).unwrap();
        assert_ne!(two, three);
        assert_eq!(three.to_string(), "001001");
    }

    #[test]
    fn test_plmn_id_invalid() {
        assert!(PlmnId::new(1000, 1, 2).is_err());
        assert!(PlmnId::new(1, 100, 2).is_err());
        assert!(PlmnId::new(1, 1, 4).is_err());
        assert!("0010".parse::<PlmnId>().is_err());
        assert!("00a01".parse::<PlmnId>().is_err());
    }

    #[test]
    fn test_plmn_id_parse() {
        let plmn: PlmnId = "999-70".parse().unwrap();
        assert_eq!(plmn, PlmnId::new(999, 70, 2).unwrap());
        let plmn: PlmnId = "00101".parse().unwrap();
        assert_eq!(plmn, PlmnId::new(1, 1, 2).unwrap());
    }

    #[test]
    fn test_plmn_id_json() {
        let plmn = PlmnId::new(1, 1, 2).unwrap();
        let json = serde_json::to_string(&plmn).unwrap();
        assert_eq!(json, r#"{"mcc":"001","mnc":"01"}"#);
        let back: PlmnId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plmn);
        assert!(serde_json::from_str::<PlmnId>(r#"{"mcc":"1","mnc":"01"}"#).is_err());
    }
}
