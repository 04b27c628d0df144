//! SBI Types
//!
//! Service types, NF types, URI schemes and the NF lifecycle states used by
//! the registry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// NF Type enumeration (3GPP TS 29.510 NFType)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NfType {
    Nrf,
    Udm,
    Amf,
    Smf,
    Ausf,
    Nef,
    Pcf,
    Smsf,
    Nssf,
    Udr,
    Lmf,
    Gmlc,
    #[serde(rename = "5G_EIR")]
    FiveGEir,
    Sepp,
    Upf,
    N3iwf,
    Af,
    Udsf,
    Bsf,
    Chf,
    Nwdaf,
    Pcscf,
    Cbcf,
    Hss,
    Ucmf,
    Scp,
    Nssaaf,
}

impl NfType {
    /// Every NF type
    pub const ALL: [NfType; 27] = [
        Self::Nrf,
        Self::Udm,
        Self::Amf,
        Self::Smf,
        Self::Ausf,
        Self::Nef,
        Self::Pcf,
        Self::Smsf,
        Self::Nssf,
        Self::Udr,
        Self::Lmf,
        Self::Gmlc,
        Self::FiveGEir,
        Self::Sepp,
        Self::Upf,
        Self::N3iwf,
        Self::Af,
        Self::Udsf,
        Self::Bsf,
        Self::Chf,
        Self::Nwdaf,
        Self::Pcscf,
        Self::Cbcf,
        Self::Hss,
        Self::Ucmf,
        Self::Scp,
        Self::Nssaaf,
    ];

    pub fn to_str(&self) -> &'static str {
        match self {
            Self::Nrf => "NRF",
            Self::Udm => "UDM",
            Self::Amf => "AMF",
            Self::Smf => "SMF",
            Self::Ausf => "AUSF",
            Self::Nef => "NEF",
            Self::Pcf => "PCF",
            Self::Smsf => "SMSF",
            Self::Nssf => "NSSF",
            Self::Udr => "UDR",
            Self::Lmf => "LMF",
            Self::Gmlc => "GMLC",
            Self::FiveGEir => "5G_EIR",
            Self::Sepp => "SEPP",
            Self::Upf => "UPF",
            Self::N3iwf => "N3IWF",
            Self::Af => "AF",
            Self::Udsf => "UDSF",
            Self::Bsf => "BSF",
            Self::Chf => "CHF",
            Self::Nwdaf => "NWDAF",
            Self::Pcscf => "PCSCF",
            Self::Cbcf => "CBCF",
            Self::Hss => "HSS",
            Self::Ucmf => "UCMF",
            Self::Scp => "SCP",
            Self::Nssaaf => "NSSAAF",
        }
    }
}

impl fmt::Display for NfType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

impl FromStr for NfType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|nf_type| nf_type.to_str().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

macro_rules! sbi_service_types {
    ($($variant:ident => $name:literal, $nf_type:ident;)*) => {
        /// SBI service types, each naming one service of one producer NF type
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum SbiServiceType {
            $($variant,)*
        }

        const SERVICE_TABLE: &[(SbiServiceType, &str, NfType)] = &[
            $((SbiServiceType::$variant, $name, NfType::$nf_type),)*
        ];
    };
}

sbi_service_types! {
    NnrfNfm => "nnrf-nfm", Nrf;
    NnrfDisc => "nnrf-disc", Nrf;
    NnrfOauth2 => "nnrf-oauth2", Nrf;
    NudmSdm => "nudm-sdm", Udm;
    NudmUecm => "nudm-uecm", Udm;
    NudmUeau => "nudm-ueau", Udm;
    NudmEe => "nudm-ee", Udm;
    NudmPp => "nudm-pp", Udm;
    NudmNiddau => "nudm-niddau", Udm;
    NudmMt => "nudm-mt", Udm;
    NamfComm => "namf-comm", Amf;
    NamfEvts => "namf-evts", Amf;
    NamfMt => "namf-mt", Amf;
    NamfLoc => "namf-loc", Amf;
    NamfOam => "namf-oam", Amf;
    NsmfPdusession => "nsmf-pdusession", Smf;
    NsmfEventExposure => "nsmf-event-exposure", Smf;
    NsmfNidd => "nsmf-nidd", Smf;
    NausfAuth => "nausf-auth", Ausf;
    NausfSorprotection => "nausf-sorprotection", Ausf;
    NausfUpuprotection => "nausf-upuprotection", Ausf;
    NnefPfdmanagement => "nnef-pfdmanagement", Nef;
    NnefSmcontext => "nnef-smcontext", Nef;
    NnefEventexposure => "nnef-eventexposure", Nef;
    NpcfAmPolicyControl => "npcf-am-policy-control", Pcf;
    NpcfSmpolicycontrol => "npcf-smpolicycontrol", Pcf;
    NpcfPolicyauthorization => "npcf-policyauthorization", Pcf;
    NpcfBdtpolicycontrol => "npcf-bdtpolicycontrol", Pcf;
    NpcfEventexposure => "npcf-eventexposure", Pcf;
    NpcfUePolicyControl => "npcf-ue-policy-control", Pcf;
    NsmsfSms => "nsmsf-sms", Smsf;
    NnssfNsselection => "nnssf-nsselection", Nssf;
    NnssfNssaiavailability => "nnssf-nssaiavailability", Nssf;
    NudrDr => "nudr-dr", Udr;
    NudrGroupIdMap => "nudr-group-id-map", Udr;
    NlmfLoc => "nlmf-loc", Lmf;
    N5gEirEic => "n5g-eir-eic", FiveGEir;
    NbsfManagement => "nbsf-management", Bsf;
    NchfSpendinglimitcontrol => "nchf-spendinglimitcontrol", Chf;
    NchfConvergedcharging => "nchf-convergedcharging", Chf;
    NchfOfflineonlycharging => "nchf-offlineonlycharging", Chf;
    NnwdafEventssubscription => "nnwdaf-eventssubscription", Nwdaf;
    NnwdafAnalyticsinfo => "nnwdaf-analyticsinfo", Nwdaf;
    NgmlcLoc => "ngmlc-loc", Gmlc;
    NucmfProvisioning => "nucmf-provisioning", Ucmf;
    NucmfUecapabilitymanagement => "nucmf-uecapabilitymanagement", Ucmf;
    NhssSdm => "nhss-sdm", Hss;
    NhssUecm => "nhss-uecm", Hss;
    NhssUeau => "nhss-ueau", Hss;
    NhssEe => "nhss-ee", Hss;
    NhssImsSdm => "nhss-ims-sdm", Hss;
    NhssImsUecm => "nhss-ims-uecm", Hss;
    NhssImsUeau => "nhss-ims-ueau", Hss;
    NseppTelescopic => "nsepp-telescopic", Sepp;
    N32cHandshake => "n32c-handshake", Sepp;
    NudsfDr => "nudsf-dr", Udsf;
    NnssaafNssaa => "nnssaaf-nssaa", Nssaaf;
}

impl SbiServiceType {
    /// Number of service types
    pub const MAX_NUM: usize = SERVICE_TABLE.len();

    fn entry(&self) -> &'static (SbiServiceType, &'static str, NfType) {
        // The table is generated from the enum in declaration order.
        &SERVICE_TABLE[*self as usize]
    }

    /// Canonical service name, e.g. "nudm-sdm"
    pub fn to_name(&self) -> &'static str {
        self.entry().1
    }

    /// NF type producing this service
    pub fn to_nf_type(&self) -> NfType {
        self.entry().2
    }

    pub fn from_name(name: &str) -> Option<Self> {
        SERVICE_TABLE
            .iter()
            .find(|(_, n, _)| *n == name)
            .map(|(service_type, _, _)| *service_type)
    }

    /// All service types produced by `nf_type`
    pub fn all_of(nf_type: NfType) -> impl Iterator<Item = SbiServiceType> {
        SERVICE_TABLE
            .iter()
            .filter(move |(_, _, t)| *t == nf_type)
            .map(|(service_type, _, _)| *service_type)
    }
}

impl fmt::Display for SbiServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_name())
    }
}

/// URI Scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UriScheme {
    #[default]
    Http,
    Https,
}

impl UriScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

impl fmt::Display for UriScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a known NF instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NfStatus {
    /// Known from configuration or a notification, not (yet) registered
    #[default]
    Undiscovered,
    Registered,
    Deregistered,
}

/// NF service status (3GPP TS 29.510 NFServiceStatus)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NfServiceStatus {
    #[default]
    Registered,
    Suspended,
    Undiscoverable,
}
