// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared fixtures for unit tests

use ifc_lite_model::IfcModel;
use ifc_lite_parser::ParsedModel;
use std::sync::Arc;

/// Two storeys (elevations 0 and 3.5 m), seven elements, ten placed
/// geometry instances
///
/// Item #60 is a 1 m cube centred on the placement in x/y; #61 is the same
/// cube stacked 1 m higher. Representation #70 holds one item, #72 two.
pub(crate) const TEST_IFC: &str = r#"ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');
FILE_NAME('two-storey.ifc','2024-01-01T00:00:00',(''),(''),'','','');
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCPROJECT('0Proj',$,'Demo Project',$,$,$,$,$,#2);
#2=IFCUNITASSIGNMENT((#3));
#3=IFCSIUNIT(*,.LENGTHUNIT.,$,.METRE.);
#4=IFCCARTESIANPOINT((0.,0.,0.));
#5=IFCAXIS2PLACEMENT3D(#4,$,$);
#6=IFCLOCALPLACEMENT($,#5);
#7=IFCDIRECTION((0.,0.,1.));
#10=IFCSITE('0Site',$,'Site',$,$,#6,$,$,.ELEMENT.,$,$,$,$,$);
#11=IFCBUILDING('0Bldg',$,'Building',$,$,#6,$,$,.ELEMENT.,$,$,$);
#12=IFCBUILDINGSTOREY('0Lvl2',$,'Level 2',$,$,#6,$,$,.ELEMENT.,3.5);
#13=IFCBUILDINGSTOREY('0Lvl1',$,'Ground Floor',$,$,#6,$,$,.ELEMENT.,0.);
#14=IFCRELAGGREGATES('0Agg1',$,$,$,#1,(#10));
#15=IFCRELAGGREGATES('0Agg2',$,$,$,#10,(#11));
#16=IFCRELAGGREGATES('0Agg3',$,$,$,#11,(#12,#13));
#17=IFCRELCONTAINEDINSPATIALSTRUCTURE('0Cnt1',$,$,$,(#30,#31,#32),#13);
#18=IFCRELCONTAINEDINSPATIALSTRUCTURE('0Cnt2',$,$,$,(#33,#34,#35,#36),#12);
#20=IFCCARTESIANPOINT((0.,0.,0.));
#21=IFCAXIS2PLACEMENT3D(#20,$,$);
#22=IFCLOCALPLACEMENT($,#21);
#23=IFCCARTESIANPOINT((4.,0.,0.));
#24=IFCAXIS2PLACEMENT3D(#23,$,$);
#25=IFCLOCALPLACEMENT($,#24);
#26=IFCCARTESIANPOINT((8.,0.,0.));
#27=IFCAXIS2PLACEMENT3D(#26,$,$);
#28=IFCLOCALPLACEMENT($,#27);
#30=IFCWALL('2O2Fr$t4X7Zf8NOew3FLOH',$,'Wall A',$,$,#22,#73,$,$);
#31=IFCWALL('1hOSvn6df7F8_7GcBWlRGQ',$,'Wall B, "north"',$,$,#25,#71,$,$);
#32=IFCSLAB('3vB2YO$MX4xv5uCqZZG05x',$,'Slab 1',$,$,#28,#73,$,$);
#33=IFCWALL('0LV8Pd3Jn5Kf0yWbjBmXhx',$,'Wall C',$,$,#42,#71,$,$);
#34=IFCCOLUMN('1GZ$7bXwH0oRw7pQe1RZ4u',$,'Column 1',$,$,#45,#71,$,$);
#35=IFCSLAB('2Jd7GkLEL8uQm3Br0uS7Ql',$,'Slab 2',$,$,#48,#73,$,$);
#36=IFCDOOR('0z8xPUf1vCIw5bKjE2eLmH',$,$,$,$,#51,#71,$,$,$,$,$,$);
#40=IFCCARTESIANPOINT((0.,0.,3.5));
#41=IFCAXIS2PLACEMENT3D(#40,$,$);
#42=IFCLOCALPLACEMENT($,#41);
#43=IFCCARTESIANPOINT((4.,0.,3.5));
#44=IFCAXIS2PLACEMENT3D(#43,$,$);
#45=IFCLOCALPLACEMENT($,#44);
#46=IFCCARTESIANPOINT((8.,0.,3.5));
#47=IFCAXIS2PLACEMENT3D(#46,$,$);
#48=IFCLOCALPLACEMENT($,#47);
#49=IFCCARTESIANPOINT((12.,0.,3.5));
#50=IFCAXIS2PLACEMENT3D(#49,$,$);
#51=IFCLOCALPLACEMENT($,#50);
#60=IFCEXTRUDEDAREASOLID(#62,#5,#7,1.);
#61=IFCEXTRUDEDAREASOLID(#62,#64,#7,1.);
#62=IFCRECTANGLEPROFILEDEF(.AREA.,$,$,1.,1.);
#63=IFCCARTESIANPOINT((0.,0.,1.));
#64=IFCAXIS2PLACEMENT3D(#63,$,$);
#70=IFCSHAPEREPRESENTATION($,'Body','SweptSolid',(#60));
#71=IFCPRODUCTDEFINITIONSHAPE($,$,(#70));
#72=IFCSHAPEREPRESENTATION($,'Body','SweptSolid',(#60,#61));
#73=IFCPRODUCTDEFINITIONSHAPE($,$,(#72));
#80=IFCPROPERTYSINGLEVALUE('IsExternal',$,IFCBOOLEAN(.T.),$);
#81=IFCPROPERTYSINGLEVALUE('FireRating',$,IFCLABEL('REI 60'),$);
#82=IFCPROPERTYSET('0Pset1',$,'Pset_WallCommon',$,(#80,#81));
#83=IFCRELDEFINESBYPROPERTIES('0Rel1',$,$,$,(#30),#82);
#84=IFCPROPERTYSINGLEVALUE('LoadBearing',$,IFCBOOLEAN(.F.),$);
#85=IFCPROPERTYSET('0Pset2',$,'Pset_WallCommon',$,(#84));
#86=IFCRELDEFINESBYPROPERTIES('0Rel2',$,$,$,(#31,#33),#85);
ENDSEC;
END-ISO-10303-21;
"#;

pub(crate) fn model() -> Arc<dyn IfcModel> {
    Arc::new(ParsedModel::parse(TEST_IFC.to_string()).unwrap())
}
