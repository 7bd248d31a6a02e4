//! DHCP option tags module.

/// The shape of an option value, used for pretty-printing and parsing
/// the textual form written to the lease database and the hook environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Ipv4,
    Ipv4List,
    Ipv4Pairs,
    U8,
    U16,
    U16List,
    U32,
    Text,
    Bytes,
}

/// DHCP options codes.
///
/// [RFC 2132](https://tools.ietf.org/html/rfc2132)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OptionTag {
    Unknown = -1,
    Pad = 0,

    /*
    RFC 2132
    */
    // RFC 1497 Vendor Extensions (RFC 2132 §3)
    SubnetMask,
    TimeOffset,
    Routers,
    TimeServers,
    NameServers,
    DomainNameServers,
    LogServers,
    QuotesServers,
    LprServers,
    ImpressServers,
    RlpServers,
    Hostname,
    BootFileSize,
    MeritDumpFile,
    DomainName,
    SwapServer,
    RootPath,
    ExtensionsPath,
    // IP Layer Parameters per Host (RFC 2132 §4)
    ForwardOnOff,
    NonLocalSourceRouteOnOff,
    PolicyFilters,
    MaxDatagramReassemblySize,
    DefaultIpTtl,
    MtuTimeout,
    MtuPlateau,
    // IP Layer Parameters per Interface (RFC 2132 §5)
    MtuInterface,
    MtuSubnet,
    BroadcastAddress,
    MaskRecovery,
    MaskSupplier,
    PerformRouterDiscovery,
    RouterSolicitationAddress,
    StaticRoutes,
    // Link Layer Parameters per Interface (RFC 2132 §6)
    TrailerEncapsulation,
    ArpTimeout,
    EthernetEncapsulation,
    // TCP Default TTL Option (RFC 2132 §7)
    DefaultTcpTtl,
    KeepaliveTime,
    KeepaliveData,
    // Application and Service Parameters (RFC 2132 §8)
    NisDomain,
    NisServers,
    NtpServers,
    VendorSpecific,
    NetbiosNameServers,
    NetbiosDistributionServers,
    NetbiosNodeType,
    NetbiosScope,
    XWindowFontServers,
    XWindowManagerServers,
    // DHCP Extensions (RFC 2132 §9)
    AddressRequest,
    AddressTime,
    Overload,
    DhcpMessageType,
    DhcpServerId,
    ParameterList,
    DhcpMessage,
    DhcpMaxMessageSize,
    RenewalTime,
    RebindingTime,
    ClassId,
    ClientId,

    /*
    RFC 2242
    */
    NetwareIpDomain,
    NetwareIpOption,

    /*
    RFC 2132 (continuation)
    */
    // Application and Service Parameters (RFC 2132 §8) (continuation)
    NisDomainName,
    NisServerAddress,
    ServerName,
    BootfileName,
    HomeAgentAddresses,
    SmtpServers,
    Pop3Servers,
    NntpServers,
    WwwServers,
    FingerServers,
    IrcServers,
    StreetTalkServers,
    StdaServers,

    /*
    RFC 3442 (The Classless Static Route Option)
    */
    ClasslessStaticRoutes = 121,

    End = 255,
}

impl From<u8> for OptionTag {
    fn from(value: u8) -> Self {
        use self::OptionTag::*;
        match value {
            0 => Pad,
            1 => SubnetMask,
            2 => TimeOffset,
            3 => Routers,
            4 => TimeServers,
            5 => NameServers,
            6 => DomainNameServers,
            7 => LogServers,
            8 => QuotesServers,
            9 => LprServers,
            10 => ImpressServers,
            11 => RlpServers,
            12 => Hostname,
            13 => BootFileSize,
            14 => MeritDumpFile,
            15 => DomainName,
            16 => SwapServer,
            17 => RootPath,
            18 => ExtensionsPath,
            19 => ForwardOnOff,
            20 => NonLocalSourceRouteOnOff,
            21 => PolicyFilters,
            22 => MaxDatagramReassemblySize,
            23 => DefaultIpTtl,
            24 => MtuTimeout,
            25 => MtuPlateau,
            26 => MtuInterface,
            27 => MtuSubnet,
            28 => BroadcastAddress,
            29 => MaskRecovery,
            30 => MaskSupplier,
            31 => PerformRouterDiscovery,
            32 => RouterSolicitationAddress,
            33 => StaticRoutes,
            34 => TrailerEncapsulation,
            35 => ArpTimeout,
            36 => EthernetEncapsulation,
            37 => DefaultTcpTtl,
            38 => KeepaliveTime,
            39 => KeepaliveData,
            40 => NisDomain,
            41 => NisServers,
            42 => NtpServers,
            43 => VendorSpecific,
            44 => NetbiosNameServers,
            45 => NetbiosDistributionServers,
            46 => NetbiosNodeType,
            47 => NetbiosScope,
            48 => XWindowFontServers,
            49 => XWindowManagerServers,
            50 => AddressRequest,
            51 => AddressTime,
            52 => Overload,
            53 => DhcpMessageType,
            54 => DhcpServerId,
            55 => ParameterList,
            56 => DhcpMessage,
            57 => DhcpMaxMessageSize,
            58 => RenewalTime,
            59 => RebindingTime,
            60 => ClassId,
            61 => ClientId,
            62 => NetwareIpDomain,
            63 => NetwareIpOption,
            64 => NisDomainName,
            65 => NisServerAddress,
            66 => ServerName,
            67 => BootfileName,
            68 => HomeAgentAddresses,
            69 => SmtpServers,
            70 => Pop3Servers,
            71 => NntpServers,
            72 => WwwServers,
            73 => FingerServers,
            74 => IrcServers,
            75 => StreetTalkServers,
            76 => StdaServers,

            121 => ClasslessStaticRoutes,

            255 => End,
            _ => Unknown,
        }
    }
}

impl OptionTag {
    /// The option name as written to the lease database
    /// and (with `-` replaced by `_`) into the hook environment.
    pub fn name(self) -> &'static str {
        use self::OptionTag::*;
        match self {
            Pad => "pad",
            SubnetMask => "subnet-mask",
            TimeOffset => "time-offset",
            Routers => "routers",
            TimeServers => "time-servers",
            NameServers => "ien116-name-servers",
            DomainNameServers => "domain-name-servers",
            LogServers => "log-servers",
            QuotesServers => "cookie-servers",
            LprServers => "lpr-servers",
            ImpressServers => "impress-servers",
            RlpServers => "resource-location-servers",
            Hostname => "host-name",
            BootFileSize => "boot-size",
            MeritDumpFile => "merit-dump",
            DomainName => "domain-name",
            SwapServer => "swap-server",
            RootPath => "root-path",
            ExtensionsPath => "extensions-path",
            ForwardOnOff => "ip-forwarding",
            NonLocalSourceRouteOnOff => "non-local-source-routing",
            PolicyFilters => "policy-filter",
            MaxDatagramReassemblySize => "max-dgram-reassembly",
            DefaultIpTtl => "default-ip-ttl",
            MtuTimeout => "path-mtu-aging-timeout",
            MtuPlateau => "path-mtu-plateau-table",
            MtuInterface => "interface-mtu",
            MtuSubnet => "all-subnets-local",
            BroadcastAddress => "broadcast-address",
            MaskRecovery => "perform-mask-discovery",
            MaskSupplier => "mask-supplier",
            PerformRouterDiscovery => "router-discovery",
            RouterSolicitationAddress => "router-solicitation-address",
            StaticRoutes => "static-routes",
            TrailerEncapsulation => "trailer-encapsulation",
            ArpTimeout => "arp-cache-timeout",
            EthernetEncapsulation => "ieee802-3-encapsulation",
            DefaultTcpTtl => "default-tcp-ttl",
            KeepaliveTime => "tcp-keepalive-interval",
            KeepaliveData => "tcp-keepalive-garbage",
            NisDomain => "nis-domain",
            NisServers => "nis-servers",
            NtpServers => "ntp-servers",
            VendorSpecific => "vendor-encapsulated-options",
            NetbiosNameServers => "netbios-name-servers",
            NetbiosDistributionServers => "netbios-dd-server",
            NetbiosNodeType => "netbios-node-type",
            NetbiosScope => "netbios-scope",
            XWindowFontServers => "font-servers",
            XWindowManagerServers => "x-display-manager",
            AddressRequest => "dhcp-requested-address",
            AddressTime => "dhcp-lease-time",
            Overload => "dhcp-option-overload",
            DhcpMessageType => "dhcp-message-type",
            DhcpServerId => "dhcp-server-identifier",
            ParameterList => "dhcp-parameter-request-list",
            DhcpMessage => "dhcp-message",
            DhcpMaxMessageSize => "dhcp-max-message-size",
            RenewalTime => "dhcp-renewal-time",
            RebindingTime => "dhcp-rebinding-time",
            ClassId => "dhcp-class-identifier",
            ClientId => "dhcp-client-identifier",
            NetwareIpDomain => "nwip-domain",
            NetwareIpOption => "nwip-suboptions",
            NisDomainName => "nisplus-domain",
            NisServerAddress => "nisplus-servers",
            ServerName => "tftp-server-name",
            BootfileName => "bootfile-name",
            HomeAgentAddresses => "mobile-ip-home-agent",
            SmtpServers => "smtp-server",
            Pop3Servers => "pop-server",
            NntpServers => "nntp-server",
            WwwServers => "www-server",
            FingerServers => "finger-server",
            IrcServers => "irc-server",
            StreetTalkServers => "streettalk-server",
            StdaServers => "streettalk-directory-assistance-server",
            ClasslessStaticRoutes => "classless-static-routes",
            End => "end",
            Unknown => "unknown",
        }
    }

    /// The reverse of `name`, used when reading the lease database back.
    pub fn from_name(name: &str) -> Option<Self> {
        for code in 1u8..=121 {
            let tag = Self::from(code);
            if tag != OptionTag::Unknown && tag.name() == name {
                return Some(tag);
            }
        }
        None
    }

    /// The value shape of the option, driving its textual form.
    pub fn kind(self) -> ValueKind {
        use self::OptionTag::*;
        match self {
            SubnetMask | SwapServer | BroadcastAddress | RouterSolicitationAddress
            | AddressRequest | DhcpServerId => ValueKind::Ipv4,

            Routers | TimeServers | NameServers | DomainNameServers | LogServers
            | QuotesServers | LprServers | ImpressServers | RlpServers | NisServers
            | NtpServers | NetbiosNameServers | NetbiosDistributionServers
            | XWindowFontServers | XWindowManagerServers | NisServerAddress
            | HomeAgentAddresses | SmtpServers | Pop3Servers | NntpServers | WwwServers
            | FingerServers | IrcServers | StreetTalkServers | StdaServers => ValueKind::Ipv4List,

            PolicyFilters | StaticRoutes => ValueKind::Ipv4Pairs,

            ForwardOnOff | NonLocalSourceRouteOnOff | DefaultIpTtl | MtuSubnet
            | MaskRecovery | MaskSupplier | PerformRouterDiscovery | TrailerEncapsulation
            | EthernetEncapsulation | DefaultTcpTtl | KeepaliveData | NetbiosNodeType
            | Overload | DhcpMessageType => ValueKind::U8,

            BootFileSize | MaxDatagramReassemblySize | MtuInterface | DhcpMaxMessageSize => {
                ValueKind::U16
            }

            MtuPlateau => ValueKind::U16List,

            TimeOffset | MtuTimeout | ArpTimeout | KeepaliveTime | AddressTime
            | RenewalTime | RebindingTime => ValueKind::U32,

            Hostname | MeritDumpFile | DomainName | RootPath | ExtensionsPath | NisDomain
            | NetbiosScope | DhcpMessage | NisDomainName | ServerName | BootfileName => {
                ValueKind::Text
            }

            _ => ValueKind::Bytes,
        }
    }
}
